use gatehouse_core::claim::ClaimConflict;
use gatehouse_core::error::CoreError;
use gatehouse_core::providers::ProviderError;

/// Errors returned by the review services.
///
/// Expected conflicts (already decided, already claimed by someone else on
/// claim, bridge already open) are outcome values, not errors. `Claimed` is
/// the exception: it aborts an action that needed the claim.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Claimed(#[from] ClaimConflict),
}

pub type ReviewResult<T> = Result<T, ReviewError>;
