//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: case }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// An outcome value together with the one-line message shown to the staff
/// member who acted.
#[derive(Debug, Serialize)]
pub struct OutcomeResponse<T: Serialize> {
    #[serde(flatten)]
    pub outcome: T,
    pub message: String,
}
