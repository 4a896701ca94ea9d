//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the review services,
//! which publish, and the background subscribers, which react.

use chrono::{DateTime, Utc};
use gatehouse_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Canonical event type names.
pub mod event_types {
    pub const CASE_SUBMITTED: &str = "case.submitted";
    pub const CASE_CLAIMED: &str = "case.claimed";
    pub const CASE_UNCLAIMED: &str = "case.unclaimed";
    pub const CASE_DECIDED: &str = "case.decided";
    pub const BRIDGE_OPENED: &str = "bridge.opened";
    pub const BRIDGE_CLOSED: &str = "bridge.closed";
    pub const BRIDGE_CLEANUP_FAILED: &str = "bridge.cleanup_failed";
    pub const TRANSCRIPT_FLUSH_FAILED: &str = "transcript.flush_failed";

    /// Events after which the staff-facing view of a case is stale.
    pub const CASE_AFFECTING: &[&str] = &[
        CASE_SUBMITTED,
        CASE_CLAIMED,
        CASE_UNCLAIMED,
        CASE_DECIDED,
        BRIDGE_OPENED,
        BRIDGE_CLOSED,
    ];
}

// ---------------------------------------------------------------------------
// ReviewEvent
// ---------------------------------------------------------------------------

/// Something that happened to a case or a bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,
    pub case_id: Option<String>,
    pub ticket_id: Option<DbId>,
    /// Staff member that triggered the event.
    pub actor_id: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ReviewEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            case_id: None,
            ticket_id: None,
            actor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    pub fn with_ticket(mut self, ticket_id: DbId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether the event marks a failure worth keeping on the monitoring trail.
    pub fn is_failure(&self) -> bool {
        self.event_type.ends_with("_failed")
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<ReviewEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer overflows.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Without subscribers the
    /// event is dropped.
    pub fn publish(&self, event: ReviewEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
