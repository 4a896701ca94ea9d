//! Gatehouse API server library.
//!
//! Exposes config, state, error handling, the platform gateway client, and
//! the route tree so integration tests and the binary entrypoint can both
//! access them.

pub mod background;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
