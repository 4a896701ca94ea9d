//! Handlers for the `/bridges` resource.

use axum::extract::State;
use axum::Json;
use gatehouse_core::bridge::{CloseOutcome, OpenOutcome};
use gatehouse_core::types::DbId;
use gatehouse_review::{CloseTarget, OpenBridge};
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiCaller;
use crate::response::{DataResponse, OutcomeResponse};
use crate::state::AppState;

/// Request body for `POST /bridges`.
#[derive(Debug, Deserialize, Validate)]
pub struct OpenBridgeRequest {
    #[validate(length(min = 1, max = 64))]
    pub workspace_id: String,
    #[validate(length(min = 1, max = 64))]
    pub applicant_id: String,
    #[validate(length(min = 1, max = 64))]
    pub handler_id: String,
    pub case_code: Option<String>,
    pub origin_message_id: Option<String>,
}

/// Request body for `POST /bridges/close`. Exactly one of `ticket_id` and
/// `channel_id` must be given.
#[derive(Debug, Deserialize, Validate)]
pub struct CloseBridgeRequest {
    pub ticket_id: Option<DbId>,
    pub channel_id: Option<String>,
    /// Staff member closing the bridge; checked for staff authority.
    pub actor_id: Option<String>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

impl CloseBridgeRequest {
    fn target(&self) -> AppResult<CloseTarget> {
        match (self.ticket_id, self.channel_id.as_deref()) {
            (Some(id), None) => Ok(CloseTarget::Ticket(id)),
            (None, Some(channel)) if !channel.trim().is_empty() => {
                Ok(CloseTarget::Channel(channel.trim().to_string()))
            }
            _ => Err(AppError::BadRequest(
                "Provide exactly one of ticket_id or channel_id".into(),
            )),
        }
    }
}

/// POST /api/v1/bridges
///
/// Open (or reopen) the relay bridge for an applicant. Concurrent requests
/// for the same applicant yield one bridge; the others see `already_open`
/// or `in_progress`.
pub async fn open_bridge(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Json(input): Json<OpenBridgeRequest>,
) -> AppResult<Json<DataResponse<OutcomeResponse<OpenOutcome>>>> {
    input.validate()?;
    let outcome = state
        .services
        .bridge
        .open(&OpenBridge {
            workspace_id: input.workspace_id,
            applicant_id: input.applicant_id,
            handler_id: input.handler_id,
            case_code: input.case_code,
            origin_message_id: input.origin_message_id,
        })
        .await?;
    Ok(Json(DataResponse {
        data: OutcomeResponse {
            message: outcome.user_message(),
            outcome,
        },
    }))
}

/// POST /api/v1/bridges/close
///
/// Close a bridge by ticket id or relay channel id. Closing an already
/// closed bridge is not an error.
pub async fn close_bridge(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Json(input): Json<CloseBridgeRequest>,
) -> AppResult<Json<DataResponse<CloseOutcome>>> {
    input.validate()?;
    let target = input.target()?;
    let actor = input.actor_id.as_deref().filter(|a| !a.trim().is_empty());
    let outcome = state
        .services
        .bridge
        .close(&target, actor, input.reason.as_deref())
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}
