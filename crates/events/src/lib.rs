//! Gatehouse event bus and background subscribers.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ReviewEvent`]: the event envelope for case and bridge activity.
//! - [`PresentationRefresher`]: re-renders the staff view of affected cases.
//! - [`MonitoringTrail`]: keeps recent best-effort failures for operators.

pub mod bus;
pub mod refresher;
pub mod trail;

pub use bus::{event_types, EventBus, ReviewEvent};
pub use refresher::PresentationRefresher;
pub use trail::MonitoringTrail;
