use axum::routing::post;
use axum::Router;

use crate::handlers::workspaces;
use crate::state::AppState;

/// Routes mounted at `/workspaces`.
///
/// ```text
/// POST   /{workspace_id}/short-codes/sync   -> sync_short_codes
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{workspace_id}/short-codes/sync",
        post(workspaces::sync_short_codes),
    )
}
