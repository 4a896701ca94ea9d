//! Handler for messages observed by the gateway.

use axum::extract::State;
use axum::Json;
use gatehouse_core::relay::{Direction, InboundMessage};
use gatehouse_review::RouteOutcome;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::ApiCaller;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /messages/inbound`.
#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    pub direction: Direction,
    pub message: InboundMessage,
}

/// POST /api/v1/messages/inbound
///
/// Relay one message across its bridge. Echoes of messages this service
/// produced, empty messages, and messages with no open bridge are ignored
/// with a reason.
pub async fn route_inbound(
    _caller: ApiCaller,
    State(state): State<AppState>,
    Json(input): Json<InboundRequest>,
) -> AppResult<Json<DataResponse<RouteOutcome>>> {
    let outcome = state
        .services
        .router
        .route_inbound(&input.message, input.direction)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}
