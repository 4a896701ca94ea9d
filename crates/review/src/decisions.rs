//! Staff decisions and their side effects.
//!
//! The status change is one transaction in [`DecisionRepo::apply`]. What
//! follows (membership, applicant notice, bridge auto-close, events) is
//! best-effort: each failure is logged and returned as a note, and none of
//! them undo the decision.

use std::sync::Arc;

use gatehouse_core::bridge::CloseReport;
use gatehouse_core::decision::{validate_reason, ActionKind, DecisionKind, DecisionOutcome};
use gatehouse_core::error::CoreError;
use gatehouse_core::providers::Delivery;
use gatehouse_core::relay::OutboundMessage;
use gatehouse_core::types::DbId;
use gatehouse_db::models::case::{ActionRecord, Case, CreateActionRecord};
use gatehouse_db::repositories::{
    ActionRepo, ApplyDecision, CaseRepo, ClaimRepo, DecisionAttempt, DecisionRepo,
};
use gatehouse_db::DbPool;
use gatehouse_events::{event_types, EventBus, ReviewEvent};
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeManager;
use crate::collaborators::Collaborators;
use crate::error::{ReviewError, ReviewResult};
use crate::notices;

/// A decision request.
#[derive(Debug, Clone, Deserialize)]
pub struct Decide {
    pub case_id: String,
    pub handler_id: String,
    pub kind: DecisionKind,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of a decision, including best-effort side-effect notes.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    pub kind: DecisionKind,
    pub outcome: DecisionOutcome,
    /// One-line response for the staff member who acted.
    pub message: String,
    /// Set when the applicant was messaged about the decision.
    pub dm_delivered: Option<bool>,
    /// Bridge closed as a consequence of the decision.
    pub bridge: Option<CloseReport>,
    pub notes: Vec<String>,
}

pub struct DecisionEngine {
    pool: DbPool,
    collaborators: Collaborators,
    bridge: Arc<BridgeManager>,
    bus: Arc<EventBus>,
}

impl DecisionEngine {
    pub fn new(
        pool: DbPool,
        collaborators: Collaborators,
        bridge: Arc<BridgeManager>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            collaborators,
            bridge,
            bus,
        }
    }

    pub async fn approve(&self, case_id: &str, handler_id: &str) -> ReviewResult<DecisionReport> {
        self.decide(&Decide {
            case_id: case_id.to_string(),
            handler_id: handler_id.to_string(),
            kind: DecisionKind::Approve,
            reason: None,
        })
        .await
    }

    pub async fn reject(
        &self,
        case_id: &str,
        handler_id: &str,
        reason: Option<&str>,
        permanent: bool,
    ) -> ReviewResult<DecisionReport> {
        let kind = if permanent {
            DecisionKind::PermReject
        } else {
            DecisionKind::Reject
        };
        self.decide(&Decide {
            case_id: case_id.to_string(),
            handler_id: handler_id.to_string(),
            kind,
            reason: reason.map(str::to_string),
        })
        .await
    }

    pub async fn kick(
        &self,
        case_id: &str,
        handler_id: &str,
        reason: Option<&str>,
    ) -> ReviewResult<DecisionReport> {
        self.decide(&Decide {
            case_id: case_id.to_string(),
            handler_id: handler_id.to_string(),
            kind: DecisionKind::Kick,
            reason: reason.map(str::to_string),
        })
        .await
    }

    /// Ask the applicant for more information (`submitted -> needs_info`).
    pub async fn request_info(
        &self,
        case_id: &str,
        handler_id: &str,
        reason: Option<&str>,
    ) -> ReviewResult<DecisionReport> {
        self.decide(&Decide {
            case_id: case_id.to_string(),
            handler_id: handler_id.to_string(),
            kind: DecisionKind::NeedsInfo,
            reason: reason.map(str::to_string),
        })
        .await
    }

    pub async fn decide(&self, request: &Decide) -> ReviewResult<DecisionReport> {
        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        validate_reason(reason).map_err(CoreError::Validation)?;

        let case = self.load(&request.case_id).await?;
        self.collaborators
            .require_staff(&case.workspace_id, &request.handler_id)
            .await?;

        let attempt = DecisionRepo::apply(
            &self.pool,
            &ApplyDecision {
                case_id: case.id.clone(),
                handler_id: request.handler_id.clone(),
                kind: request.kind,
                reason: reason.map(str::to_string),
            },
        )
        .await?;

        let outcome = match attempt {
            DecisionAttempt::Decided(outcome) => outcome,
            DecisionAttempt::Blocked(conflict) => return Err(ReviewError::Claimed(conflict)),
            DecisionAttempt::NotFound => return Err(CoreError::not_found("case", &case.id).into()),
        };

        let mut report = DecisionReport {
            kind: request.kind,
            outcome,
            message: outcome.user_message(request.kind),
            dm_delivered: None,
            bridge: None,
            notes: Vec::new(),
        };

        match outcome {
            DecisionOutcome::Changed { action_id } => {
                tracing::info!(
                    case_id = %case.id,
                    handler_id = %request.handler_id,
                    kind = request.kind.as_str(),
                    action_id,
                    "Decision recorded"
                );
                self.apply_side_effects(&case, request, reason, action_id, &mut report)
                    .await;
            }
            DecisionOutcome::Already
            | DecisionOutcome::Terminal { .. }
            | DecisionOutcome::Invalid { .. } => {
                tracing::debug!(case_id = %case.id, ?outcome, "Decision not applied");
            }
        }

        Ok(report)
    }

    async fn apply_side_effects(
        &self,
        case: &Case,
        request: &Decide,
        reason: Option<&str>,
        action_id: DbId,
        report: &mut DecisionReport,
    ) {
        let membership = &self.collaborators.membership;
        let effect = match request.kind {
            DecisionKind::Approve => Some(
                membership
                    .grant_membership(&case.workspace_id, &case.applicant_id)
                    .await,
            ),
            DecisionKind::Kick => Some(
                membership
                    .remove_member(&case.workspace_id, &case.applicant_id, reason)
                    .await,
            ),
            DecisionKind::Reject | DecisionKind::PermReject | DecisionKind::NeedsInfo => None,
        };
        if let Some(Err(e)) = effect {
            tracing::warn!(case_id = %case.id, error = %e, "Membership update failed");
            report
                .notes
                .push(format!("Membership could not be updated: {e}"));
        }

        let dm = OutboundMessage::text(notices::decision_dm(
            request.kind,
            reason,
            self.bridge.config().branding_name.as_str(),
        ));
        let delivery = self.collaborators.direct.send_direct(&case.applicant_id, &dm).await;
        let metadata = match &delivery {
            Delivery::Sent { .. } => serde_json::json!({ "dmDelivered": true }),
            Delivery::Failed { reason } => {
                tracing::warn!(case_id = %case.id, reason = %reason, "Decision notice not delivered");
                report
                    .notes
                    .push(format!("Applicant could not be notified: {reason}"));
                serde_json::json!({ "dmDelivered": false, "dmError": reason })
            }
        };
        report.dm_delivered = Some(delivery.is_sent());
        if let Err(e) = ActionRepo::attach_metadata(&self.pool, action_id, &metadata).await {
            tracing::warn!(case_id = %case.id, action_id, error = %e, "Failed to record delivery metadata");
        }

        if request.kind.is_terminal() {
            match self
                .bridge
                .auto_close(
                    &case.workspace_id,
                    &case.applicant_id,
                    &request.handler_id,
                    reason.or(Some(request.kind.as_str())),
                )
                .await
            {
                Ok(Some(close)) => {
                    report.notes.extend(close.notes.iter().cloned());
                    report.bridge = Some(close);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(case_id = %case.id, error = %e, "Bridge auto-close failed");
                    report.notes.push(format!("Bridge could not be closed: {e}"));
                }
            }
        }

        self.bus.publish(
            ReviewEvent::new(event_types::CASE_DECIDED)
                .with_case(&case.id)
                .with_actor(&request.handler_id)
                .with_payload(serde_json::json!({
                    "kind": request.kind.as_str(),
                    "action_id": action_id,
                    "reason": reason,
                })),
        );
    }

    /// Record that a handler copied the applicant's id. No status change;
    /// subject to the claim guard.
    pub async fn record_copy_id(&self, case_id: &str, handler_id: &str) -> ReviewResult<ActionRecord> {
        let case = self.load(case_id).await?;
        self.collaborators
            .require_staff(&case.workspace_id, handler_id)
            .await?;
        let claim = ClaimRepo::get(&self.pool, case_id).await?;
        gatehouse_core::claim::guard(claim.as_ref().map(|c| c.handler_id.as_str()), handler_id)?;

        let record = ActionRepo::create(
            &self.pool,
            &CreateActionRecord {
                case_id: case.id,
                handler_id: handler_id.to_string(),
                action: ActionKind::CopyId.as_str().to_string(),
                reason: None,
                metadata: None,
            },
        )
        .await?;
        Ok(record)
    }

    /// Audit history of a case, oldest first.
    pub async fn history(&self, case_id: &str) -> ReviewResult<Vec<ActionRecord>> {
        self.load(case_id).await?;
        Ok(ActionRepo::list_for_case(&self.pool, case_id).await?)
    }

    async fn load(&self, case_id: &str) -> ReviewResult<Case> {
        CaseRepo::find_by_id(&self.pool, case_id)
            .await?
            .ok_or_else(|| CoreError::not_found("case", case_id).into())
    }
}
