//! Route definitions for the `/bridges` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::bridges;
use crate::state::AppState;

/// Routes mounted at `/bridges`.
///
/// ```text
/// POST   /          -> open_bridge
/// POST   /close     -> close_bridge
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(bridges::open_bridge))
        .route("/close", post(bridges::close_bridge))
}
