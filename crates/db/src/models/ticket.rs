//! Messaging ticket, open-ticket guard, and message mapping models.

use gatehouse_core::bridge::GuardState;
use gatehouse_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `tickets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub id: DbId,
    pub workspace_id: String,
    pub applicant_id: String,
    pub case_code: Option<String>,
    pub origin_message_id: Option<String>,
    /// Unset while the relay channel is being created.
    pub channel_id: Option<String>,
    pub status: String,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub close_reason: Option<String>,
    pub transcript_channel_id: Option<String>,
    pub transcript_message_id: Option<String>,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status == "open"
    }
}

/// DTO for reserving a bridge.
#[derive(Debug, Clone)]
pub struct CreateTicket {
    pub workspace_id: String,
    pub applicant_id: String,
    pub case_code: Option<String>,
    pub origin_message_id: Option<String>,
}

/// A row from the `open_ticket_guard` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OpenTicketGuard {
    pub workspace_id: String,
    pub applicant_id: String,
    pub channel_id: String,
    pub ticket_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl OpenTicketGuard {
    pub fn state(&self) -> GuardState {
        GuardState::from_channel(Some(&self.channel_id))
    }
}

/// A row from the `message_mappings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageMapping {
    pub id: DbId,
    pub ticket_id: DbId,
    pub direction: String,
    pub relay_message_id: String,
    pub private_message_id: String,
    pub relay_reply_to_id: Option<String>,
    pub private_reply_to_id: Option<String>,
    pub author_name: String,
    pub content: String,
    pub attachment_urls: Json<Vec<String>>,
    pub created_at: Timestamp,
}

/// DTO for recording a relayed message.
#[derive(Debug, Clone)]
pub struct CreateMessageMapping {
    pub ticket_id: DbId,
    pub direction: String,
    pub relay_message_id: String,
    pub private_message_id: String,
    pub relay_reply_to_id: Option<String>,
    pub private_reply_to_id: Option<String>,
    pub author_name: String,
    pub content: String,
    pub attachment_urls: Vec<String>,
}
