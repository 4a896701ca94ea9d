//! Route definitions for the `/cases` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::cases;
use crate::state::AppState;

/// Routes mounted at `/cases`.
///
/// ```text
/// POST   /                        -> create_case
/// GET    /resolve                 -> resolve_case (?workspace_id&code&message_id)
/// POST   /{case_id}/submit        -> submit_case
/// POST   /{case_id}/claim         -> claim_case
/// POST   /{case_id}/unclaim       -> unclaim_case
/// POST   /{case_id}/decide        -> decide_case
/// POST   /{case_id}/copy-id       -> copy_id
/// POST   /{case_id}/reply         -> reply
/// GET    /{case_id}/actions       -> list_actions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(cases::create_case))
        .route("/resolve", get(cases::resolve_case))
        .route("/{case_id}/submit", post(cases::submit_case))
        .route("/{case_id}/claim", post(cases::claim_case))
        .route("/{case_id}/unclaim", post(cases::unclaim_case))
        .route("/{case_id}/decide", post(cases::decide_case))
        .route("/{case_id}/copy-id", post(cases::copy_id))
        .route("/{case_id}/reply", post(cases::reply))
        .route("/{case_id}/actions", get(cases::list_actions))
}
