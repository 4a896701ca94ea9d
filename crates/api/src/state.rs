use std::sync::Arc;

use gatehouse_events::{EventBus, MonitoringTrail};
use gatehouse_review::ReviewServices;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: gatehouse_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Review services wired to the platform gateway.
    pub services: ReviewServices,
    /// Bus the services publish case and bridge events on.
    pub event_bus: Arc<EventBus>,
    /// Recent best-effort failures, for operators.
    pub trail: MonitoringTrail,
}
