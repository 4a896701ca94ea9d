#![allow(dead_code)]

use std::sync::Arc;

use gatehouse_core::bridge::OpenOutcome;
use gatehouse_core::relay::InboundMessage;
use gatehouse_core::types::DbId;
use gatehouse_db::models::case::{Case, CreateCase};
use gatehouse_events::EventBus;
use gatehouse_review::{BridgeConfig, Collaborators, LoopbackGateway, OpenBridge, ReviewServices};
use sqlx::SqlitePool;

pub const WORKSPACE: &str = "ws1";
pub const APPLICANT: &str = "a1";
pub const HANDLER: &str = "h1";
pub const OTHER_HANDLER: &str = "h2";
pub const ARCHIVE_CHANNEL: &str = "archive";

/// Services over a test pool and an in-memory gateway.
pub struct Harness {
    pub pool: SqlitePool,
    pub gateway: Arc<LoopbackGateway>,
    pub bus: Arc<EventBus>,
    pub services: ReviewServices,
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        transcript_channel_id: Some(ARCHIVE_CHANNEL.to_string()),
        branding_name: "Acme".to_string(),
        ..BridgeConfig::default()
    }
}

/// Handlers `h1` and `h2` are staff; everyone else is not.
pub fn harness(pool: SqlitePool) -> Harness {
    harness_with(pool, LoopbackGateway::with_staff([HANDLER, OTHER_HANDLER]), test_config())
}

pub fn harness_with(pool: SqlitePool, gateway: LoopbackGateway, config: BridgeConfig) -> Harness {
    let gateway = Arc::new(gateway);
    gateway.set_profile(APPLICANT, "Jane Applicant");
    gateway.set_profile(HANDLER, "Hank");
    let bus = Arc::new(EventBus::default());
    let services = ReviewServices::new(
        pool.clone(),
        Collaborators::from_gateway(gateway.clone()),
        bus.clone(),
        config,
    );
    Harness {
        pool,
        gateway,
        bus,
        services,
    }
}

impl Harness {
    pub async fn draft_case(&self, applicant_id: &str) -> Case {
        self.services
            .intake
            .create(&CreateCase {
                workspace_id: WORKSPACE.to_string(),
                applicant_id: applicant_id.to_string(),
                origin_message_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn submitted_case(&self, applicant_id: &str) -> Case {
        let case = self.draft_case(applicant_id).await;
        self.services.intake.submit(&case.id).await.unwrap()
    }

    /// Open a bridge for `applicant_id`, returning `(ticket_id, channel_id)`.
    pub async fn open_bridge(&self, applicant_id: &str, case_code: Option<&str>) -> (DbId, String) {
        let outcome = self
            .services
            .bridge
            .open(&OpenBridge {
                workspace_id: WORKSPACE.to_string(),
                applicant_id: applicant_id.to_string(),
                handler_id: HANDLER.to_string(),
                case_code: case_code.map(str::to_string),
                origin_message_id: None,
            })
            .await
            .unwrap();
        match outcome {
            OpenOutcome::Opened {
                ticket_id,
                channel_id,
                ..
            } => (ticket_id, channel_id),
            other => panic!("expected a new bridge, got {other:?}"),
        }
    }
}

/// A staff member posting in a relay channel.
pub fn staff_message(channel_id: &str, message_id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        message_id: message_id.to_string(),
        channel_id: channel_id.to_string(),
        author_id: HANDLER.to_string(),
        workspace_id: Some(WORKSPACE.to_string()),
        content: content.to_string(),
        attachments: Vec::new(),
        reply_to_message_id: None,
    }
}

/// The applicant writing in their private channel.
pub fn applicant_message(message_id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        message_id: message_id.to_string(),
        channel_id: "dm-a1".to_string(),
        author_id: APPLICANT.to_string(),
        workspace_id: None,
        content: content.to_string(),
        attachments: Vec::new(),
        reply_to_message_id: None,
    }
}
