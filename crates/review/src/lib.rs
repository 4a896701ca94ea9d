//! Case review services: intake, lookup, claims, decisions, and the
//! messaging bridge between staff relay channels and applicants.

pub mod bridge;
pub mod claims;
pub mod collaborators;
pub mod config;
pub mod decisions;
pub mod error;
pub mod intake;
pub mod lookup;
pub mod loopback;
pub mod notices;
pub mod router;
pub mod services;
pub mod sets;
pub mod transcript;

pub use bridge::{BridgeManager, CloseTarget, OpenBridge};
pub use claims::ClaimManager;
pub use collaborators::Collaborators;
pub use config::BridgeConfig;
pub use decisions::{Decide, DecisionEngine, DecisionReport};
pub use error::{ReviewError, ReviewResult};
pub use intake::Intake;
pub use lookup::{CaseLookup, SyncReport};
pub use loopback::LoopbackGateway;
pub use router::{IgnoreReason, MessageRouter, ReplyOutcome, RouteOutcome};
pub use services::ReviewServices;
pub use sets::{ForwardedSet, OpenChannelSet};
pub use transcript::TranscriptRecorder;
