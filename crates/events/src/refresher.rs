//! Keeps the staff-facing case view in sync with case and bridge events.

use std::sync::Arc;

use gatehouse_core::providers::CasePresenter;
use tokio::sync::broadcast;

use crate::bus::{event_types, ReviewEvent};

/// Background subscriber that asks the presenter to re-render a case after
/// every case-affecting event.
pub struct PresentationRefresher;

impl PresentationRefresher {
    /// Run until the bus is dropped. Refresh failures are logged and skipped.
    pub async fn run(
        presenter: Arc<dyn CasePresenter>,
        mut receiver: broadcast::Receiver<ReviewEvent>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if !event_types::CASE_AFFECTING.contains(&event.event_type.as_str()) {
                        continue;
                    }
                    let Some(case_id) = event.case_id.as_deref() else {
                        continue;
                    };
                    if let Err(e) = presenter.refresh(case_id).await {
                        tracing::warn!(
                            error = %e,
                            case_id,
                            event_type = %event.event_type,
                            "Presentation refresh failed"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Presentation refresher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, presentation refresher shutting down");
                    break;
                }
            }
        }
    }
}
