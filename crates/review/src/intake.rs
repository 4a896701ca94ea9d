//! Case intake: create drafts and submit them for review.

use std::sync::Arc;

use gatehouse_core::error::CoreError;
use gatehouse_db::models::case::{Case, CreateCase};
use gatehouse_db::repositories::CaseRepo;
use gatehouse_db::DbPool;
use gatehouse_events::{event_types, EventBus, ReviewEvent};

use crate::error::ReviewResult;

#[derive(Clone)]
pub struct Intake {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl Intake {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Create a draft case. Its short code is indexed in the same transaction.
    pub async fn create(&self, input: &CreateCase) -> ReviewResult<Case> {
        if input.workspace_id.trim().is_empty() || input.applicant_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "workspace_id and applicant_id are required".to_string(),
            )
            .into());
        }
        let case = CaseRepo::create(&self.pool, input).await?;
        tracing::info!(case_id = %case.id, workspace_id = %case.workspace_id, "Case created");
        Ok(case)
    }

    /// Move a draft to `submitted`.
    pub async fn submit(&self, case_id: &str) -> ReviewResult<Case> {
        if let Some(case) = CaseRepo::submit(&self.pool, case_id).await? {
            tracing::info!(case_id, "Case submitted");
            self.bus.publish(
                ReviewEvent::new(event_types::CASE_SUBMITTED)
                    .with_case(case_id)
                    .with_payload(serde_json::json!({
                        "workspace_id": case.workspace_id,
                        "applicant_id": case.applicant_id,
                    })),
            );
            return Ok(case);
        }

        match CaseRepo::find_by_id(&self.pool, case_id).await? {
            None => Err(CoreError::not_found("case", case_id).into()),
            Some(case) => Err(CoreError::Conflict(format!(
                "Case {case_id} is {} and cannot be submitted",
                case.status
            ))
            .into()),
        }
    }
}
