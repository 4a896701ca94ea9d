use axum::routing::get;
use axum::Router;

use crate::handlers::monitoring;
use crate::state::AppState;

/// Routes mounted at `/monitoring`.
pub fn router() -> Router<AppState> {
    Router::new().route("/trail", get(monitoring::trail))
}
