pub mod bridge;
pub mod case_status;
pub mod claim;
pub mod decision;
pub mod error;
pub mod providers;
pub mod relay;
pub mod short_code;
pub mod transcript;
pub mod types;
