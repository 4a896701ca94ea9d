//! Text of the messages the service itself posts.

use gatehouse_core::bridge::CLOSE_NOTICE_MARKER;
use gatehouse_core::decision::DecisionKind;
use gatehouse_core::providers::UserProfile;
use gatehouse_core::types::DbId;

/// Private message telling the applicant about a decision.
pub fn decision_dm(kind: DecisionKind, reason: Option<&str>, branding: &str) -> String {
    let head = match kind {
        DecisionKind::Approve => format!("Your application to {branding} has been approved. Welcome!"),
        DecisionKind::Reject | DecisionKind::PermReject => {
            format!("Your application to {branding} has been rejected.")
        }
        DecisionKind::Kick => format!("You have been removed from {branding}."),
        DecisionKind::NeedsInfo => {
            format!("The {branding} staff need more information about your application.")
        }
    };
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{head}\nReason: {reason}"),
        None => head,
    }
}

/// First message in a new relay channel.
pub fn bridge_intro(applicant: &UserProfile, case_code: Option<&str>, reopened: bool) -> String {
    let verb = if reopened { "Reopened" } else { "Opened" };
    match case_code {
        Some(code) => format!(
            "{verb} a bridge with {} (<@{}>) for case {code}. Messages posted here are relayed to them privately.",
            applicant.display_name, applicant.user_id
        ),
        None => format!(
            "{verb} a bridge with {} (<@{}>). Messages posted here are relayed to them privately.",
            applicant.display_name, applicant.user_id
        ),
    }
}

/// Private message telling the applicant a bridge is open.
pub fn bridge_opened_dm(branding: &str) -> String {
    format!("The {branding} staff would like to talk with you. Reply to this conversation to answer them.")
}

/// Posted in the relay channel before it is disposed of.
pub fn close_notice(reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{CLOSE_NOTICE_MARKER} This bridge was closed: {reason}"),
        None => format!("{CLOSE_NOTICE_MARKER} This bridge was closed."),
    }
}

/// Private message telling the applicant the bridge closed.
pub fn bridge_closed_dm(branding: &str) -> String {
    format!("Your conversation with the {branding} staff has ended.")
}

/// Posted in the relay channel when a message could not reach the applicant.
pub fn undelivered_notice(reason: &str) -> String {
    format!("This message could not be delivered to the applicant ({reason}).")
}

/// Caption of an archived transcript.
pub fn transcript_caption(ticket_id: DbId, applicant_id: &str, lines: usize) -> String {
    format!("Transcript of bridge #{ticket_id} with <@{applicant_id}> ({lines} messages)")
}
