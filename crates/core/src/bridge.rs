//! Messaging bridge constants, states, and outcomes.
//!
//! A bridge pairs a staff-facing relay channel with the applicant's private
//! channel. At most one bridge per (workspace, applicant) is open at a time;
//! the `open_ticket_guard` table row is the mutex.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::transcript::TranscriptRef;
use crate::types::{DbId, Timestamp};

/// Placeholder stored in the guard row while the relay channel is being created.
pub const GUARD_PENDING: &str = "pending";

/// A closed bridge reopens in place within this many days of closing.
pub const DEFAULT_REOPEN_WINDOW_DAYS: i64 = 7;

/// Pending guard rows older than this are assumed orphaned by a crash.
pub const PENDING_GUARD_STALE_MINS: i64 = 10;

/// How long a delivered message id stays in the echo-suppression set.
pub const FORWARDED_TTL_SECS: u64 = 300;

/// How often the echo-suppression set is swept.
pub const FORWARDED_SWEEP_INTERVAL_SECS: u64 = 60;

/// How many recent relay messages are scanned for an existing closing notice.
pub const CLOSE_NOTICE_SCAN_LIMIT: usize = 25;

/// Marker embedded in the closing notice so repeated closes post it once.
pub const CLOSE_NOTICE_MARKER: &str = "[bridge closed]";

/// Ticket lifecycle status as stored in `tickets.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the guard row says about a (workspace, applicant) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Absent,
    Pending,
    Open { channel_id: String },
}

impl GuardState {
    /// Interpret the `channel_id` column of an optional guard row.
    pub fn from_channel(channel_id: Option<&str>) -> Self {
        match channel_id {
            None => Self::Absent,
            Some(GUARD_PENDING) => Self::Pending,
            Some(id) => Self::Open {
                channel_id: id.to_string(),
            },
        }
    }
}

/// What happens to the relay channel when a bridge closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePolicy {
    /// Delete the channel, falling back to lock + archive, then to leaving it.
    #[default]
    Delete,
    /// Lock and archive the channel, falling back to leaving it.
    Archive,
}

impl FromStr for ClosePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "archive" => Ok(Self::Archive),
            other => Err(CoreError::Validation(format!(
                "Invalid close policy '{other}'. Must be one of: delete, archive"
            ))),
        }
    }
}

/// How the relay channel was actually disposed of on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDisposal {
    Deleted,
    Archived,
    Left,
    /// The ticket never got a channel.
    NoChannel,
}

/// Whether a bridge closed at `closed_at` may still be reopened at `now`.
pub fn within_reopen_window(closed_at: Timestamp, now: Timestamp, window_days: i64) -> bool {
    now >= closed_at && now - closed_at <= Duration::days(window_days)
}

/// Name for a new relay channel, e.g. `relay-jane-a1b2c3`.
///
/// Lower-cases, keeps `[a-z0-9-]`, collapses everything else to `-`, and caps
/// the result at 90 characters.
pub fn relay_channel_name(applicant_name: &str, case_code: Option<&str>) -> String {
    let mut slug = String::with_capacity(applicant_name.len());
    for c in applicant_name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "applicant" } else { slug };

    let mut name = format!("relay-{slug}");
    if let Some(code) = case_code {
        name.push('-');
        name.push_str(&code.to_ascii_lowercase());
    }
    name.truncate(90);
    name
}

/// Outcome of an open-bridge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpenOutcome {
    /// This call created (or reopened) the bridge.
    Opened {
        ticket_id: DbId,
        channel_id: String,
        reopened: bool,
    },
    /// A bridge is already open for this applicant.
    AlreadyOpen { channel_id: String },
    /// Another request is creating the bridge right now; retry shortly.
    InProgress,
}

impl OpenOutcome {
    pub fn user_message(&self) -> String {
        match self {
            Self::Opened {
                channel_id,
                reopened: true,
                ..
            } => format!("Reopened the bridge in <#{channel_id}>."),
            Self::Opened { channel_id, .. } => format!("Opened a bridge in <#{channel_id}>."),
            Self::AlreadyOpen { channel_id } => {
                format!("A bridge is already open in <#{channel_id}>.")
            }
            Self::InProgress => {
                "A bridge for this applicant is being created, try again in a moment.".to_string()
            }
        }
    }
}

/// Details of a completed close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseReport {
    pub ticket_id: DbId,
    pub transcript: Option<TranscriptRef>,
    pub disposal: ChannelDisposal,
    /// Best-effort failures encountered while closing.
    pub notes: Vec<String>,
}

/// Outcome of a close-bridge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CloseOutcome {
    Closed(CloseReport),
    AlreadyClosed { ticket_id: DbId },
    NotFound,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_guard_state_from_channel() {
        assert_eq!(GuardState::from_channel(None), GuardState::Absent);
        assert_eq!(GuardState::from_channel(Some("pending")), GuardState::Pending);
        assert_eq!(
            GuardState::from_channel(Some("123")),
            GuardState::Open {
                channel_id: "123".to_string()
            }
        );
    }

    #[test]
    fn test_close_policy_parse() {
        assert_eq!("delete".parse::<ClosePolicy>().unwrap(), ClosePolicy::Delete);
        assert_eq!("ARCHIVE".parse::<ClosePolicy>().unwrap(), ClosePolicy::Archive);
        assert!("burn".parse::<ClosePolicy>().is_err());
        assert_eq!(ClosePolicy::default(), ClosePolicy::Delete);
    }

    #[test]
    fn test_reopen_window_bounds() {
        let closed = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(within_reopen_window(closed, closed + Duration::days(7), 7));
        assert!(!within_reopen_window(
            closed,
            closed + Duration::days(7) + Duration::seconds(1),
            7
        ));
        assert!(!within_reopen_window(closed, closed - Duration::seconds(1), 7));
    }

    #[test]
    fn test_relay_channel_name_slugifies() {
        assert_eq!(relay_channel_name("Jane Doe!", Some("A1B2C3")), "relay-jane-doe-a1b2c3");
        assert_eq!(relay_channel_name("***", None), "relay-applicant");
    }

    #[test]
    fn test_relay_channel_name_is_capped() {
        let long = "a".repeat(200);
        assert_eq!(relay_channel_name(&long, None).len(), 90);
    }

    #[test]
    fn test_open_outcome_messages() {
        let msg = OpenOutcome::AlreadyOpen {
            channel_id: "55".to_string(),
        }
        .user_message();
        assert!(msg.contains("<#55>"));
        assert!(OpenOutcome::InProgress.user_message().contains("try again"));
    }
}
