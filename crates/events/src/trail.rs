//! Bounded in-memory record of operational failures.
//!
//! Best-effort phases (transcript flushes, channel cleanup) never fail the
//! request that triggered them. They publish a `*_failed` event instead, and
//! [`MonitoringTrail`] keeps the most recent ones for operators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::bus::ReviewEvent;

/// Entries kept before the oldest is dropped.
pub const DEFAULT_TRAIL_CAPACITY: usize = 200;

#[derive(Clone)]
pub struct MonitoringTrail {
    entries: Arc<Mutex<VecDeque<ReviewEvent>>>,
    capacity: usize,
}

impl MonitoringTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Append a failure event, evicting the oldest entry when full.
    pub fn record(&self, event: ReviewEvent) {
        tracing::warn!(
            event_type = %event.event_type,
            case_id = ?event.case_id,
            ticket_id = ?event.ticket_id,
            payload = %event.payload,
            "Monitoring trail entry"
        );
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Newest-last copy of the trail.
    pub fn snapshot(&self) -> Vec<ReviewEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Record every failure event published on the bus until it is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<ReviewEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.is_failure() => self.record(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Monitoring trail lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ReviewEvent>> {
        // A poisoned trail is still a valid trail.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MonitoringTrail {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}
