//! Membership case status machine.
//!
//! Statuses only ever move toward a terminal state. The database layer reads
//! the current status inside a write transaction and asks
//! [`check_transition`] whether the requested target may be applied.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a membership case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    NeedsInfo,
    Kicked,
}

/// Statuses from which a decision may be taken.
pub const DECIDABLE_STATUSES: &[CaseStatus] = &[CaseStatus::Submitted, CaseStatus::NeedsInfo];

/// Statuses that count as "still open" for an applicant.
pub const OPEN_STATUSES: &[CaseStatus] = &[
    CaseStatus::Draft,
    CaseStatus::Submitted,
    CaseStatus::NeedsInfo,
];

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NeedsInfo => "needs_info",
            Self::Kicked => "kicked",
        }
    }

    /// `approved`, `rejected` and `kicked` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Kicked)
    }

    /// Whether a decision may be taken from this status.
    pub fn is_decidable(self) -> bool {
        DECIDABLE_STATUSES.contains(&self)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "needs_info" => Ok(Self::NeedsInfo),
            "kicked" => Ok(Self::Kicked),
            other => Err(CoreError::Validation(format!(
                "Unknown case status '{other}'"
            ))),
        }
    }
}

/// Result of checking a requested status change against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The transition is allowed and should be written.
    Proceed,
    /// The case is already in the target status.
    Already,
    /// The case reached a different terminal status first.
    Terminal(CaseStatus),
    /// The case is not in a status that accepts decisions.
    Invalid(CaseStatus),
}

/// Decide whether `current` may move to `target`.
///
/// Order matters: an identical status wins over the terminal check so a
/// double-submitted decision reads as `Already` rather than `Terminal`.
pub fn check_transition(current: CaseStatus, target: CaseStatus) -> TransitionCheck {
    if current == target {
        return TransitionCheck::Already;
    }
    if current.is_terminal() {
        return TransitionCheck::Terminal(current);
    }
    if !current.is_decidable() {
        return TransitionCheck::Invalid(current);
    }
    // needs_info is only reachable from submitted.
    if target == CaseStatus::NeedsInfo && current != CaseStatus::Submitted {
        return TransitionCheck::Invalid(current);
    }
    TransitionCheck::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(CaseStatus::Approved.is_terminal());
        assert!(CaseStatus::Rejected.is_terminal());
        assert!(CaseStatus::Kicked.is_terminal());
        assert!(!CaseStatus::Submitted.is_terminal());
        assert!(!CaseStatus::NeedsInfo.is_terminal());
        assert!(!CaseStatus::Draft.is_terminal());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            CaseStatus::Draft,
            CaseStatus::Submitted,
            CaseStatus::Approved,
            CaseStatus::Rejected,
            CaseStatus::NeedsInfo,
            CaseStatus::Kicked,
        ] {
            assert_eq!(status.as_str().parse::<CaseStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let err = "archived".parse::<CaseStatus>().unwrap_err();
        assert!(err.to_string().contains("Unknown case status"));
    }

    #[test]
    fn test_submitted_to_approved_proceeds() {
        assert_eq!(
            check_transition(CaseStatus::Submitted, CaseStatus::Approved),
            TransitionCheck::Proceed
        );
        assert_eq!(
            check_transition(CaseStatus::NeedsInfo, CaseStatus::Kicked),
            TransitionCheck::Proceed
        );
    }

    #[test]
    fn test_same_terminal_is_already() {
        assert_eq!(
            check_transition(CaseStatus::Approved, CaseStatus::Approved),
            TransitionCheck::Already
        );
    }

    #[test]
    fn test_other_terminal_is_terminal() {
        assert_eq!(
            check_transition(CaseStatus::Approved, CaseStatus::Rejected),
            TransitionCheck::Terminal(CaseStatus::Approved)
        );
        assert_eq!(
            check_transition(CaseStatus::Kicked, CaseStatus::NeedsInfo),
            TransitionCheck::Terminal(CaseStatus::Kicked)
        );
    }

    #[test]
    fn test_draft_is_invalid_source() {
        assert_eq!(
            check_transition(CaseStatus::Draft, CaseStatus::Approved),
            TransitionCheck::Invalid(CaseStatus::Draft)
        );
    }

    #[test]
    fn test_needs_info_only_from_submitted() {
        assert_eq!(
            check_transition(CaseStatus::Submitted, CaseStatus::NeedsInfo),
            TransitionCheck::Proceed
        );
        assert_eq!(
            check_transition(CaseStatus::NeedsInfo, CaseStatus::NeedsInfo),
            TransitionCheck::Already
        );
    }

    #[test]
    fn test_nothing_returns_to_submitted() {
        for terminal in [CaseStatus::Approved, CaseStatus::Rejected, CaseStatus::Kicked] {
            assert_ne!(
                check_transition(terminal, CaseStatus::Submitted),
                TransitionCheck::Proceed
            );
        }
    }
}
