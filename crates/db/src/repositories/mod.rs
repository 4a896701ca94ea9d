//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&DbPool` as the first argument. Multi-statement operations open
//! their own transaction and never call back into the pool while holding it.

pub mod action_repo;
pub mod case_repo;
pub mod claim_repo;
pub mod decision_repo;
pub mod message_mapping_repo;
pub mod short_code_repo;
pub mod ticket_repo;

pub use action_repo::ActionRepo;
pub use case_repo::CaseRepo;
pub use claim_repo::ClaimRepo;
pub use decision_repo::{ApplyDecision, DecisionAttempt, DecisionRepo};
pub use message_mapping_repo::MessageMappingRepo;
pub use short_code_repo::{CaseMessageRepo, ShortCodeRepo};
pub use ticket_repo::{Reservation, TicketRepo};
