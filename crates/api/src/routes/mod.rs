pub mod bridges;
pub mod cases;
pub mod health;
pub mod messages;
pub mod monitoring;
pub mod workspaces;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /cases                                           intake (POST)
/// /cases/resolve                                   resolve by code, message, or id (GET)
/// /cases/{case_id}/submit                          draft -> submitted (POST)
/// /cases/{case_id}/claim                           claim (POST)
/// /cases/{case_id}/unclaim                         unclaim (POST)
/// /cases/{case_id}/decide                          decision (POST)
/// /cases/{case_id}/copy-id                         copy-id audit (POST)
/// /cases/{case_id}/reply                           reply to applicant (POST)
/// /cases/{case_id}/actions                         action history (GET)
///
/// /workspaces/{workspace_id}/short-codes/sync      short-code backfill (POST)
///
/// /bridges                                         open bridge (POST)
/// /bridges/close                                   close bridge (POST)
///
/// /messages/inbound                                route a relayed message (POST)
///
/// /monitoring/trail                                recent best-effort failures (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/cases", cases::router())
        .nest("/workspaces", workspaces::router())
        .nest("/bridges", bridges::router())
        .nest("/messages", messages::router())
        .nest("/monitoring", monitoring::router())
}
