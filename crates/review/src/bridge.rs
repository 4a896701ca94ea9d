//! Messaging bridge lifecycle: open, close, auto-close, startup rebuild.
//!
//! Opening is a two-transaction protocol around the `open_ticket_guard` row:
//! reserve (guard `pending` + ticket), create the relay channel outside any
//! transaction, then activate (guard gets the channel id). A failure between
//! the two releases the guard so the pair can be retried.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use gatehouse_core::bridge::{
    relay_channel_name, ChannelDisposal, CloseOutcome, CloseReport, ClosePolicy, GuardState,
    OpenOutcome, CLOSE_NOTICE_MARKER, CLOSE_NOTICE_SCAN_LIMIT, PENDING_GUARD_STALE_MINS,
};
use gatehouse_core::error::CoreError;
use gatehouse_core::providers::{Delivery, ProviderError};
use gatehouse_core::relay::OutboundMessage;
use gatehouse_core::short_code::{is_complete, normalize_code};
use gatehouse_core::types::DbId;
use gatehouse_db::models::ticket::{CreateTicket, Ticket};
use gatehouse_db::repositories::{Reservation, TicketRepo};
use gatehouse_db::DbPool;
use gatehouse_events::{event_types, EventBus, ReviewEvent};
use serde::Deserialize;

use crate::collaborators::Collaborators;
use crate::config::BridgeConfig;
use crate::error::ReviewResult;
use crate::lookup::CaseLookup;
use crate::notices;
use crate::sets::OpenChannelSet;
use crate::transcript::TranscriptRecorder;

/// Request to open a bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenBridge {
    pub workspace_id: String,
    pub applicant_id: String,
    /// Staff member opening the bridge.
    pub handler_id: String,
    pub case_code: Option<String>,
    pub origin_message_id: Option<String>,
}

/// Which bridge to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseTarget {
    Ticket(DbId),
    Channel(String),
}

pub struct BridgeManager {
    pool: DbPool,
    collaborators: Collaborators,
    transcripts: Arc<TranscriptRecorder>,
    open_channels: Arc<OpenChannelSet>,
    lookup: CaseLookup,
    bus: Arc<EventBus>,
    config: BridgeConfig,
    closing: Mutex<HashSet<DbId>>,
}

impl BridgeManager {
    pub fn new(
        pool: DbPool,
        collaborators: Collaborators,
        transcripts: Arc<TranscriptRecorder>,
        open_channels: Arc<OpenChannelSet>,
        bus: Arc<EventBus>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            lookup: CaseLookup::new(pool.clone()),
            pool,
            collaborators,
            transcripts,
            open_channels,
            bus,
            config,
            closing: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Open (or reopen) the bridge for an applicant.
    pub async fn open(&self, request: &OpenBridge) -> ReviewResult<OpenOutcome> {
        self.collaborators
            .require_staff(&request.workspace_id, &request.handler_id)
            .await?;

        let case_code = request
            .case_code
            .as_deref()
            .map(normalize_code)
            .filter(|c| is_complete(c));

        if let Some(guard) =
            TicketRepo::find_guard(&self.pool, &request.workspace_id, &request.applicant_id).await?
        {
            match guard.state() {
                GuardState::Open { channel_id } => return Ok(OpenOutcome::AlreadyOpen { channel_id }),
                GuardState::Pending => return Ok(OpenOutcome::InProgress),
                GuardState::Absent => {}
            }
        }

        let reservation = TicketRepo::reserve(
            &self.pool,
            &CreateTicket {
                workspace_id: request.workspace_id.clone(),
                applicant_id: request.applicant_id.clone(),
                case_code: case_code.clone(),
                origin_message_id: request.origin_message_id.clone(),
            },
            Utc::now(),
            self.config.reopen_window_days,
        )
        .await?;

        let (ticket, reopened) = match reservation {
            Reservation::Exists { channel_id } => return Ok(OpenOutcome::AlreadyOpen { channel_id }),
            Reservation::InProgress => return Ok(OpenOutcome::InProgress),
            Reservation::Reserved {
                ticket, reopened, ..
            } => (ticket, reopened),
        };

        let channel_id = match self.provision_channel(&ticket, reopened).await {
            Ok(channel_id) => channel_id,
            Err(e) => {
                tracing::error!(ticket_id = ticket.id, error = %e, "Relay channel setup failed");
                self.release_reservation(&ticket).await;
                return Err(e);
            }
        };

        let activated = match TicketRepo::activate(&self.pool, &ticket, &channel_id).await {
            Ok(activated) => activated,
            Err(e) => {
                self.release_reservation(&ticket).await;
                self.discard_channel(&channel_id).await;
                return Err(e.into());
            }
        };
        if !activated {
            tracing::warn!(ticket_id = ticket.id, "Pending guard expired before activation");
            self.discard_channel(&channel_id).await;
            if let Err(e) = TicketRepo::abandon(&self.pool, ticket.id, "reservation expired").await {
                tracing::warn!(ticket_id = ticket.id, error = %e, "Failed to abandon expired ticket");
            }
            return Err(CoreError::Conflict("Bridge reservation expired, try again".to_string()).into());
        }
        self.open_channels.insert(&channel_id);

        let dm = OutboundMessage::text(notices::bridge_opened_dm(&self.config.branding_name));
        let delivery = self.collaborators.direct.send_direct(&ticket.applicant_id, &dm).await;
        if !delivery.is_sent() {
            tracing::warn!(ticket_id = ticket.id, ?delivery, "Applicant was not notified of the bridge");
        }

        tracing::info!(ticket_id = ticket.id, channel_id = %channel_id, reopened, "Bridge opened");
        self.publish(event_types::BRIDGE_OPENED, &ticket, Some(&request.handler_id))
            .await;

        Ok(OpenOutcome::Opened {
            ticket_id: ticket.id,
            channel_id,
            reopened,
        })
    }

    /// Create the relay channel, let handlers post in it, and post the intro.
    async fn provision_channel(&self, ticket: &Ticket, reopened: bool) -> ReviewResult<String> {
        let channels = &self.collaborators.channels;
        let applicant = self
            .collaborators
            .profile_or_unknown(&ticket.workspace_id, &ticket.applicant_id)
            .await;
        let name = relay_channel_name(&applicant.display_name, ticket.case_code.as_deref());

        let channel_id = channels
            .create_relay_channel(
                &ticket.workspace_id,
                self.config.relay_parent_id.as_deref(),
                &name,
            )
            .await?;

        let setup = async {
            channels.grant_handler_access(&channel_id).await?;
            let intro = notices::bridge_intro(&applicant, ticket.case_code.as_deref(), reopened);
            channels
                .send_message(&channel_id, &OutboundMessage::text(intro))
                .await?;
            Ok::<(), ProviderError>(())
        };
        if let Err(e) = setup.await {
            self.discard_channel(&channel_id).await;
            return Err(e.into());
        }
        Ok(channel_id)
    }

    async fn release_reservation(&self, ticket: &Ticket) {
        if let Err(e) = TicketRepo::release_pending(&self.pool, ticket).await {
            tracing::error!(
                ticket_id = ticket.id,
                workspace_id = %ticket.workspace_id,
                applicant_id = %ticket.applicant_id,
                error = %e,
                "Failed to release pending guard, manual intervention required"
            );
            return;
        }
        if let Err(e) = TicketRepo::abandon(&self.pool, ticket.id, "channel setup failed").await {
            tracing::warn!(ticket_id = ticket.id, error = %e, "Failed to abandon ticket");
        }
    }

    async fn discard_channel(&self, channel_id: &str) {
        if let Err(e) = self.collaborators.channels.delete_channel(channel_id).await {
            tracing::warn!(channel_id, error = %e, "Failed to delete orphaned relay channel");
        }
    }

    /// Close a bridge. Every phase is best-effort; the ticket is marked
    /// closed regardless, and phase failures come back as report notes.
    pub async fn close(
        &self,
        target: &CloseTarget,
        actor_id: Option<&str>,
        reason: Option<&str>,
    ) -> ReviewResult<CloseOutcome> {
        let ticket = match target {
            CloseTarget::Ticket(id) => TicketRepo::find_by_id(&self.pool, *id).await?,
            CloseTarget::Channel(channel_id) => {
                TicketRepo::find_by_channel(&self.pool, channel_id).await?
            }
        };
        let Some(ticket) = ticket else {
            return Ok(CloseOutcome::NotFound);
        };
        if !ticket.is_open() {
            return Ok(CloseOutcome::AlreadyClosed {
                ticket_id: ticket.id,
            });
        }
        if let Some(actor_id) = actor_id {
            self.collaborators
                .require_staff(&ticket.workspace_id, actor_id)
                .await?;
        }

        if !self.begin_closing(ticket.id) {
            return Ok(CloseOutcome::AlreadyClosed {
                ticket_id: ticket.id,
            });
        }
        let result = self.close_ticket(&ticket, actor_id, reason).await;
        self.end_closing(ticket.id);
        result.map(CloseOutcome::Closed)
    }

    /// Close the applicant's open bridge after a terminal decision, tagged
    /// with the decision reason. No-op when there is none.
    pub async fn auto_close(
        &self,
        workspace_id: &str,
        applicant_id: &str,
        actor_id: &str,
        reason: Option<&str>,
    ) -> ReviewResult<Option<CloseReport>> {
        let Some(ticket) =
            TicketRepo::find_open_for_applicant(&self.pool, Some(workspace_id), applicant_id)
                .await?
        else {
            return Ok(None);
        };
        match self
            .close(&CloseTarget::Ticket(ticket.id), None, reason)
            .await?
        {
            CloseOutcome::Closed(report) => {
                tracing::info!(ticket_id = ticket.id, actor_id, "Bridge auto-closed after decision");
                Ok(Some(report))
            }
            CloseOutcome::AlreadyClosed { .. } | CloseOutcome::NotFound => Ok(None),
        }
    }

    async fn close_ticket(
        &self,
        ticket: &Ticket,
        actor_id: Option<&str>,
        reason: Option<&str>,
    ) -> ReviewResult<CloseReport> {
        let mut notes = Vec::new();

        if let Some(channel_id) = ticket.channel_id.as_deref() {
            if let Err(e) = self.post_close_notice(channel_id, reason).await {
                tracing::warn!(ticket_id = ticket.id, error = %e, "Closing notice failed");
                notes.push(format!("Closing notice could not be posted: {e}"));
            }
        }

        let transcript = match self.transcripts.flush(ticket).await {
            Ok(Some(transcript)) => {
                if let Err(e) = TicketRepo::set_transcript(
                    &self.pool,
                    ticket.id,
                    &transcript.channel_id,
                    &transcript.message_id,
                )
                .await
                {
                    tracing::warn!(ticket_id = ticket.id, error = %e, "Failed to record transcript location");
                    notes.push("Transcript location could not be recorded.".to_string());
                }
                Some(transcript)
            }
            Ok(None) => None,
            Err(e) => {
                notes.push(format!("Transcript could not be archived: {e}"));
                None
            }
        };
        // The ticket is closing; message mappings keep the record.
        self.transcripts.discard(ticket.id).await;

        let disposal = match ticket.channel_id.as_deref() {
            Some(channel_id) => {
                self.open_channels.remove(channel_id);
                self.dispose_channel(channel_id, &mut notes).await
            }
            None => ChannelDisposal::NoChannel,
        };

        if let Err(e) = TicketRepo::delete_guard(&self.pool, ticket).await {
            tracing::error!(ticket_id = ticket.id, error = %e, "Failed to delete open-ticket guard");
            notes.push("Open-ticket guard could not be removed.".to_string());
        }

        TicketRepo::mark_closed(&self.pool, ticket.id, reason).await?;

        let dm = OutboundMessage::text(notices::bridge_closed_dm(&self.config.branding_name));
        if let Delivery::Failed { reason } =
            self.collaborators.direct.send_direct(&ticket.applicant_id, &dm).await
        {
            tracing::warn!(ticket_id = ticket.id, reason = %reason, "Applicant was not notified of the close");
            notes.push(format!("Applicant could not be notified: {reason}"));
        }

        tracing::info!(ticket_id = ticket.id, ?disposal, notes = notes.len(), "Bridge closed");
        self.publish(event_types::BRIDGE_CLOSED, ticket, actor_id).await;
        if !notes.is_empty() {
            self.bus.publish(
                ReviewEvent::new(event_types::BRIDGE_CLEANUP_FAILED)
                    .with_ticket(ticket.id)
                    .with_payload(serde_json::json!({ "notes": notes })),
            );
        }

        Ok(CloseReport {
            ticket_id: ticket.id,
            transcript,
            disposal,
            notes,
        })
    }

    /// Post the closing notice unless a recent message already carries it.
    async fn post_close_notice(
        &self,
        channel_id: &str,
        reason: Option<&str>,
    ) -> Result<(), ProviderError> {
        let channels = &self.collaborators.channels;
        let recent = channels
            .recent_messages(channel_id, CLOSE_NOTICE_SCAN_LIMIT)
            .await?;
        if recent
            .iter()
            .any(|m| m.from_service && m.content.contains(CLOSE_NOTICE_MARKER))
        {
            return Ok(());
        }
        channels
            .send_message(channel_id, &OutboundMessage::text(notices::close_notice(reason)))
            .await?;
        Ok(())
    }

    /// Delete, falling back to lock + archive, falling back to leaving the
    /// channel as it is.
    async fn dispose_channel(&self, channel_id: &str, notes: &mut Vec<String>) -> ChannelDisposal {
        let channels = &self.collaborators.channels;

        if self.config.close_policy == ClosePolicy::Delete {
            match channels.delete_channel(channel_id).await {
                Ok(()) | Err(ProviderError::NotFound(_)) => return ChannelDisposal::Deleted,
                Err(e) => {
                    tracing::warn!(channel_id, error = %e, "Relay channel delete failed, archiving instead");
                    notes.push(format!("Relay channel could not be deleted: {e}"));
                }
            }
        }

        match channels.lock_and_archive(channel_id).await {
            Ok(()) => ChannelDisposal::Archived,
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "Relay channel archive failed, leaving it");
                notes.push(format!("Relay channel could not be archived: {e}"));
                ChannelDisposal::Left
            }
        }
    }

    /// Startup recovery: restore lost guards, sweep stale `pending` guards,
    /// and reload the open-channel set from open tickets.
    pub async fn rebuild_open_set(&self) -> ReviewResult<usize> {
        let restored = TicketRepo::restore_missing_guards(&self.pool).await?;
        if restored > 0 {
            tracing::warn!(restored, "Restored missing open-ticket guards");
        }
        self.sweep_stale_pending().await?;

        let channels = TicketRepo::list_open_channels(&self.pool).await?;
        let count = channels.len();
        self.open_channels.replace(channels);
        tracing::info!(open_bridges = count, "Open-channel set rebuilt");
        Ok(count)
    }

    /// Delete `pending` guards left behind by a crash mid-open.
    pub async fn sweep_stale_pending(&self) -> ReviewResult<u64> {
        let swept =
            TicketRepo::sweep_stale_pending(&self.pool, Duration::minutes(PENDING_GUARD_STALE_MINS))
                .await?;
        if swept > 0 {
            tracing::warn!(swept, "Swept stale pending bridge guards");
        }
        Ok(swept)
    }

    fn begin_closing(&self, ticket_id: DbId) -> bool {
        self.closing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ticket_id)
    }

    fn end_closing(&self, ticket_id: DbId) {
        self.closing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&ticket_id);
    }

    async fn publish(&self, event_type: &str, ticket: &Ticket, actor_id: Option<&str>) {
        let mut event = ReviewEvent::new(event_type)
            .with_ticket(ticket.id)
            .with_payload(serde_json::json!({
                "workspace_id": ticket.workspace_id,
                "applicant_id": ticket.applicant_id,
                "channel_id": ticket.channel_id,
            }));
        if let Some(actor_id) = actor_id {
            event = event.with_actor(actor_id);
        }
        if let Some(case_id) = self.case_id_for(ticket).await {
            event = event.with_case(case_id);
        }
        self.bus.publish(event);
    }

    async fn case_id_for(&self, ticket: &Ticket) -> Option<String> {
        let code = ticket.case_code.as_deref()?;
        match self.lookup.find_by_short_code(&ticket.workspace_id, code).await {
            Ok(case) => case.map(|c| c.id),
            Err(e) => {
                tracing::debug!(ticket_id = ticket.id, error = %e, "Case lookup for bridge event failed");
                None
            }
        }
    }
}
