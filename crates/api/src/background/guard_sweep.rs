//! Periodic removal of stale `pending` open-ticket guards.
//!
//! A guard stays `pending` only while a bridge is being set up. One left
//! behind by a crash would block the applicant forever, so guards older
//! than [`PENDING_GUARD_STALE_MINS`] are cleared.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::bridge::PENDING_GUARD_STALE_MINS;
use gatehouse_review::BridgeManager;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(bridge: Arc<BridgeManager>, cancel: CancellationToken) {
    let period = Duration::from_secs(PENDING_GUARD_STALE_MINS.unsigned_abs() * 60);
    tracing::info!(interval_secs = period.as_secs(), "Pending-guard sweeper started");

    let mut interval = tokio::time::interval(period);
    // Startup already swept once.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Pending-guard sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match bridge.sweep_stale_pending().await {
                    Ok(0) => tracing::debug!("Pending-guard sweep: nothing stale"),
                    Ok(removed) => tracing::info!(removed, "Pending-guard sweep: cleared stale guards"),
                    Err(e) => tracing::error!(error = %e, "Pending-guard sweep failed"),
                }
            }
        }
    }
}
