//! Decision kinds, audit action kinds, and decision outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::case_status::CaseStatus;
use crate::error::CoreError;
use crate::types::DbId;

/// Maximum length of a free-text decision reason.
pub const MAX_REASON_LEN: usize = 1000;

/// A staff decision on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    PermReject,
    Kick,
    NeedsInfo,
}

impl DecisionKind {
    /// The status a case ends up in after this decision.
    pub fn target_status(self) -> CaseStatus {
        match self {
            Self::Approve => CaseStatus::Approved,
            Self::Reject | Self::PermReject => CaseStatus::Rejected,
            Self::Kick => CaseStatus::Kicked,
            Self::NeedsInfo => CaseStatus::NeedsInfo,
        }
    }

    /// The audit action recorded for this decision.
    pub fn action_kind(self) -> ActionKind {
        match self {
            Self::Approve => ActionKind::Approve,
            Self::Reject => ActionKind::Reject,
            Self::PermReject => ActionKind::PermReject,
            Self::Kick => ActionKind::Kick,
            Self::NeedsInfo => ActionKind::NeedsInfo,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.target_status().is_terminal()
    }

    pub fn is_permanent(self) -> bool {
        self == Self::PermReject
    }

    pub fn as_str(self) -> &'static str {
        self.action_kind().as_str()
    }
}

impl FromStr for DecisionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "perm_reject" => Ok(Self::PermReject),
            "kick" => Ok(Self::Kick),
            "needs_info" => Ok(Self::NeedsInfo),
            other => Err(CoreError::Validation(format!(
                "Invalid decision '{other}'. Must be one of: approve, reject, perm_reject, kick, needs_info"
            ))),
        }
    }
}

/// Kinds of rows in the append-only `action_records` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approve,
    Reject,
    PermReject,
    Kick,
    NeedsInfo,
    Claim,
    Unclaim,
    CopyId,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::PermReject => "perm_reject",
            Self::Kick => "kick",
            Self::NeedsInfo => "needs_info",
            Self::Claim => "claim",
            Self::Unclaim => "unclaim",
            Self::CopyId => "copy_id",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying a decision inside one store transaction.
///
/// Callers must match exhaustively; a new variant is a compile error
/// everywhere an outcome is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The status changed and one action record was written.
    Changed { action_id: DbId },
    /// The case was already in the target status; nothing was written.
    Already,
    /// A different terminal decision was made earlier.
    Terminal { current: CaseStatus },
    /// The case is not in a decidable status.
    Invalid { current: CaseStatus },
}

impl DecisionOutcome {
    /// One-line explanation suitable for the staff member who acted.
    pub fn user_message(&self, kind: DecisionKind) -> String {
        match self {
            Self::Changed { .. } => format!("Decision recorded: {}.", kind.as_str()),
            Self::Already => format!("This case is already {}.", kind.target_status()),
            Self::Terminal { current } => {
                format!("A decision was already made on this case ({current}).")
            }
            Self::Invalid { current } => {
                format!("This case cannot be decided while it is {current}.")
            }
        }
    }
}

/// Validate an optional decision reason.
pub fn validate_reason(reason: Option<&str>) -> Result<(), String> {
    match reason {
        Some(r) if r.chars().count() > MAX_REASON_LEN => Err(format!(
            "Reason must be at most {MAX_REASON_LEN} characters, got {}",
            r.chars().count()
        )),
        _ => Ok(()),
    }
}
