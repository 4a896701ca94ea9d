//! Periodic expiry of the router's forwarded-message set.
//!
//! Entries only matter for as long as the platform might echo a message
//! back; after their TTL they are dropped so the set stays bounded.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::bridge::FORWARDED_SWEEP_INTERVAL_SECS;
use gatehouse_review::ForwardedSet;
use tokio_util::sync::CancellationToken;

/// How often expired entries are removed.
const SWEEP_INTERVAL: Duration = Duration::from_secs(FORWARDED_SWEEP_INTERVAL_SECS);

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(forwarded: Arc<ForwardedSet>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Forwarded-set sweeper started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Forwarded-set sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let removed = forwarded.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = forwarded.len(), "Forwarded set swept");
                }
            }
        }
    }
}
