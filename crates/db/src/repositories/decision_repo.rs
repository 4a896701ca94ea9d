//! Atomic status transitions for decisions.

use chrono::Utc;
use gatehouse_core::case_status::{check_transition, CaseStatus, TransitionCheck};
use gatehouse_core::claim::{guard, ClaimConflict};
use gatehouse_core::decision::{DecisionKind, DecisionOutcome};

use crate::models::case::CreateActionRecord;
use crate::repositories::action_repo::ActionRepo;
use crate::repositories::case_repo::lock_case;
use crate::DbPool;

/// Input for [`DecisionRepo::apply`].
#[derive(Debug, Clone)]
pub struct ApplyDecision {
    pub case_id: String,
    pub handler_id: String,
    pub kind: DecisionKind,
    pub reason: Option<String>,
}

/// What happened to a decision attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionAttempt {
    /// The transition check ran; see the outcome.
    Decided(DecisionOutcome),
    /// Another handler holds the claim; nothing was written.
    Blocked(ClaimConflict),
    NotFound,
}

/// Applies decisions as single transactions.
pub struct DecisionRepo;

impl DecisionRepo {
    /// Apply a decision.
    ///
    /// In one transaction: lock the case, check the claim, read the status,
    /// and if the transition is allowed append the action record, update the
    /// status and resolution fields, and clear the claim when the new status is
    /// terminal. A repeated decision reads as `Already` and writes nothing.
    pub async fn apply(
        pool: &DbPool,
        input: &ApplyDecision,
    ) -> Result<DecisionAttempt, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !lock_case(&mut tx, &input.case_id).await? {
            return Ok(DecisionAttempt::NotFound);
        }

        let holder: Option<(String,)> =
            sqlx::query_as("SELECT handler_id FROM claims WHERE case_id = $1")
                .bind(&input.case_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Err(conflict) = guard(holder.as_ref().map(|h| h.0.as_str()), &input.handler_id) {
            return Ok(DecisionAttempt::Blocked(conflict));
        }

        let (status,): (String,) = sqlx::query_as("SELECT status FROM cases WHERE id = $1")
            .bind(&input.case_id)
            .fetch_one(&mut *tx)
            .await?;
        let current: CaseStatus = status
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let target = input.kind.target_status();
        match check_transition(current, target) {
            TransitionCheck::Already => return Ok(DecisionAttempt::Decided(DecisionOutcome::Already)),
            TransitionCheck::Terminal(current) => {
                return Ok(DecisionAttempt::Decided(DecisionOutcome::Terminal { current }))
            }
            TransitionCheck::Invalid(current) => {
                return Ok(DecisionAttempt::Decided(DecisionOutcome::Invalid { current }))
            }
            TransitionCheck::Proceed => {}
        }

        let action_id = ActionRepo::insert(
            &mut tx,
            &CreateActionRecord {
                case_id: input.case_id.clone(),
                handler_id: input.handler_id.clone(),
                action: input.kind.action_kind().as_str().to_string(),
                reason: input.reason.clone(),
                metadata: None,
            },
        )
        .await?;

        let now = Utc::now();
        if target.is_terminal() {
            let permanent = input.kind.is_permanent();
            sqlx::query(
                "UPDATE cases SET
                    status = $2,
                    updated_at = $3,
                    resolved_at = $3,
                    resolver_id = $4,
                    resolution_reason = $5,
                    permanently_rejected = $6,
                    permanently_rejected_at = CASE WHEN $6 THEN $3 ELSE NULL END
                 WHERE id = $1",
            )
            .bind(&input.case_id)
            .bind(target.as_str())
            .bind(now)
            .bind(&input.handler_id)
            .bind(&input.reason)
            .bind(permanent)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM claims WHERE case_id = $1")
                .bind(&input.case_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE cases SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(&input.case_id)
                .bind(target.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            case_id = %input.case_id,
            action_id,
            decision = input.kind.as_str(),
            "Decision applied",
        );
        Ok(DecisionAttempt::Decided(DecisionOutcome::Changed { action_id }))
    }
}
