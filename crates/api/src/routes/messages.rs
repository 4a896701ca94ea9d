use axum::routing::post;
use axum::Router;

use crate::handlers::messages;
use crate::state::AppState;

/// Routes mounted at `/messages`.
pub fn router() -> Router<AppState> {
    Router::new().route("/inbound", post(messages::route_inbound))
}
