//! Request extractors and middleware.
//!
//! - [`auth::ApiCaller`] -- Requires the shared API token as a Bearer token.
//! - [`correlation`] -- Exposes the request id to error responses.

pub mod auth;
pub mod correlation;
