use axum::extract::State;
use axum::Json;
use gatehouse_events::ReviewEvent;

use crate::error::AppResult;
use crate::middleware::auth::ApiCaller;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/monitoring/trail
///
/// Recent best-effort failures (transcript flushes, channel cleanup),
/// oldest first.
pub async fn trail(
    _caller: ApiCaller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ReviewEvent>>>> {
    Ok(Json(DataResponse {
        data: state.trail.snapshot(),
    }))
}
