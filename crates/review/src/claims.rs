//! Exclusive case claims.

use std::sync::Arc;

use gatehouse_core::claim::{guard, ClaimOutcome, UnclaimOutcome};
use gatehouse_db::models::case::Claim;
use gatehouse_db::repositories::{CaseRepo, ClaimRepo};
use gatehouse_db::DbPool;
use gatehouse_events::{event_types, EventBus, ReviewEvent};

use crate::collaborators::Collaborators;
use crate::error::ReviewResult;

#[derive(Clone)]
pub struct ClaimManager {
    pool: DbPool,
    collaborators: Collaborators,
    bus: Arc<EventBus>,
}

impl ClaimManager {
    pub fn new(pool: DbPool, collaborators: Collaborators, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            collaborators,
            bus,
        }
    }

    pub async fn get_claim(&self, case_id: &str) -> ReviewResult<Option<Claim>> {
        Ok(ClaimRepo::get(&self.pool, case_id).await?)
    }

    /// Fail with [`ReviewError::Claimed`](crate::ReviewError::Claimed) if
    /// another handler holds the case.
    pub async fn guard(&self, case_id: &str, acting_handler_id: &str) -> ReviewResult<()> {
        let claim = ClaimRepo::get(&self.pool, case_id).await?;
        guard(claim.as_ref().map(|c| c.handler_id.as_str()), acting_handler_id)?;
        Ok(())
    }

    pub async fn claim(&self, case_id: &str, handler_id: &str) -> ReviewResult<ClaimOutcome> {
        let Some(case) = CaseRepo::find_by_id(&self.pool, case_id).await? else {
            return Ok(ClaimOutcome::NotFound);
        };
        self.collaborators
            .require_staff(&case.workspace_id, handler_id)
            .await?;

        let outcome = ClaimRepo::acquire(&self.pool, case_id, handler_id).await?;
        if let ClaimOutcome::Claimed {
            refreshed: false, ..
        } = &outcome
        {
            tracing::info!(case_id, handler_id, "Case claimed");
            self.bus.publish(
                ReviewEvent::new(event_types::CASE_CLAIMED)
                    .with_case(case_id)
                    .with_actor(handler_id),
            );
        }
        Ok(outcome)
    }

    pub async fn unclaim(&self, case_id: &str, handler_id: &str) -> ReviewResult<UnclaimOutcome> {
        let Some(case) = CaseRepo::find_by_id(&self.pool, case_id).await? else {
            return Ok(UnclaimOutcome::NotClaimed);
        };
        self.collaborators
            .require_staff(&case.workspace_id, handler_id)
            .await?;

        let outcome = ClaimRepo::release(&self.pool, case_id, handler_id).await?;
        if outcome == UnclaimOutcome::Released {
            tracing::info!(case_id, handler_id, "Case released");
            self.bus.publish(
                ReviewEvent::new(event_types::CASE_UNCLAIMED)
                    .with_case(case_id)
                    .with_actor(handler_id),
            );
        }
        Ok(outcome)
    }
}
