//! Handlers for the `/cases` resource.
//!
//! Intake, resolution, claims, decisions, and the reply modal. Expected
//! conflicts (someone else holds the claim, the case was already decided)
//! come back as outcome values with a staff-facing message, not as errors.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gatehouse_core::claim::{ClaimOutcome, UnclaimOutcome};
use gatehouse_core::decision::DecisionKind;
use gatehouse_core::error::CoreError;
use gatehouse_core::short_code::derive_short_code;
use gatehouse_db::models::case::{ActionRecord, Case, CreateCase};
use gatehouse_review::{Decide, DecisionReport, ReplyOutcome};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::ApiCaller;
use crate::response::{DataResponse, OutcomeResponse};
use crate::state::AppState;

/// A case with its display short code.
#[derive(Debug, Serialize)]
pub struct CaseView {
    #[serde(flatten)]
    pub case: Case,
    pub short_code: Option<String>,
}

impl From<Case> for CaseView {
    fn from(case: Case) -> Self {
        let short_code = derive_short_code(&case.id).ok();
        Self { case, short_code }
    }
}

/// Request body for `POST /cases`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseRequest {
    #[validate(length(min = 1, max = 64))]
    pub workspace_id: String,
    #[validate(length(min = 1, max = 64))]
    pub applicant_id: String,
    #[validate(length(min = 1, max = 64))]
    pub origin_message_id: Option<String>,
}

/// Request body naming the acting staff member.
#[derive(Debug, Deserialize, Validate)]
pub struct HandlerRequest {
    #[validate(length(min = 1, max = 64))]
    pub handler_id: String,
}

/// Request body for `POST /cases/{case_id}/decide`.
#[derive(Debug, Deserialize, Validate)]
pub struct DecideRequest {
    #[validate(length(min = 1, max = 64))]
    pub handler_id: String,
    pub decision: DecisionKind,
    pub reason: Option<String>,
}

/// Request body for `POST /cases/{case_id}/reply`.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 64))]
    pub handler_id: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

/// Query parameters for `GET /cases/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub workspace_id: String,
    pub code: Option<String>,
    pub message_id: Option<String>,
}

/// POST /api/v1/cases
///
/// Create a draft case. Its short code is indexed immediately.
pub async fn create_case(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Json(input): Json<CreateCaseRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CaseView>>)> {
    input.validate()?;
    let case = state
        .services
        .intake
        .create(&CreateCase {
            workspace_id: input.workspace_id,
            applicant_id: input.applicant_id,
            origin_message_id: input.origin_message_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: case.into() })))
}

/// POST /api/v1/cases/{case_id}/submit
pub async fn submit_case(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> AppResult<Json<DataResponse<CaseView>>> {
    let case = state.services.intake.submit(&case_id).await?;
    Ok(Json(DataResponse { data: case.into() }))
}

/// GET /api/v1/cases/resolve?workspace_id=&code=&message_id=
///
/// Resolve by originating message, then short code, then full case id.
/// Returns 404 when nothing matches.
pub async fn resolve_case(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Query(params): Query<ResolveQuery>,
) -> AppResult<Json<DataResponse<CaseView>>> {
    let case = state
        .services
        .lookup
        .resolve(
            &params.workspace_id,
            params.code.as_deref(),
            params.message_id.as_deref(),
        )
        .await?;

    match case {
        Some(case) => Ok(Json(DataResponse { data: case.into() })),
        None => {
            let key = params.code.or(params.message_id).unwrap_or_default();
            Err(CoreError::not_found("case", key).into())
        }
    }
}

/// POST /api/v1/cases/{case_id}/claim
pub async fn claim_case(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(input): Json<HandlerRequest>,
) -> AppResult<Json<DataResponse<OutcomeResponse<ClaimOutcome>>>> {
    input.validate()?;
    let outcome = state.services.claims.claim(&case_id, &input.handler_id).await?;
    if outcome == ClaimOutcome::NotFound {
        return Err(CoreError::not_found("case", case_id).into());
    }
    Ok(Json(DataResponse {
        data: OutcomeResponse {
            message: outcome.user_message(),
            outcome,
        },
    }))
}

/// POST /api/v1/cases/{case_id}/unclaim
pub async fn unclaim_case(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(input): Json<HandlerRequest>,
) -> AppResult<Json<DataResponse<OutcomeResponse<UnclaimOutcome>>>> {
    input.validate()?;
    let outcome = state
        .services
        .claims
        .unclaim(&case_id, &input.handler_id)
        .await?;
    Ok(Json(DataResponse {
        data: OutcomeResponse {
            message: outcome.user_message(),
            outcome,
        },
    }))
}

/// POST /api/v1/cases/{case_id}/decide
///
/// Apply a decision. The status change is atomic; membership, the applicant
/// notice, and the bridge close are best-effort and reported in `notes`.
pub async fn decide_case(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(input): Json<DecideRequest>,
) -> AppResult<Json<DataResponse<DecisionReport>>> {
    input.validate()?;
    let report = state
        .services
        .decisions
        .decide(&Decide {
            case_id,
            handler_id: input.handler_id,
            kind: input.decision,
            reason: input.reason,
        })
        .await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/cases/{case_id}/copy-id
///
/// Audit that a staff member copied the applicant's id.
pub async fn copy_id(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(input): Json<HandlerRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ActionRecord>>)> {
    input.validate()?;
    let record = state
        .services
        .decisions
        .record_copy_id(&case_id, &input.handler_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// POST /api/v1/cases/{case_id}/reply
pub async fn reply(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(input): Json<ReplyRequest>,
) -> AppResult<Json<DataResponse<ReplyOutcome>>> {
    input.validate()?;
    let outcome = state
        .services
        .router
        .reply_from_case(&case_id, &input.handler_id, &input.content)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/cases/{case_id}/actions
///
/// Action history, oldest first.
pub async fn list_actions(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<ActionRecord>>>> {
    if state.services.lookup.load(&case_id).await?.is_none() {
        return Err(CoreError::not_found("case", case_id).into());
    }
    let history = state.services.decisions.history(&case_id).await?;
    Ok(Json(DataResponse { data: history }))
}
