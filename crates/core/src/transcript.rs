//! Plain-text bridge transcripts.
//!
//! Each routed message becomes exactly one rendered line, so the line count
//! of a transcript equals the number of messages relayed over the bridge.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Which side of the bridge authored a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Staff,
    Applicant,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Self::Staff => "STAFF",
            Self::Applicant => "APPLICANT",
        }
    }
}

/// One buffered transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub at: Timestamp,
    pub side: Side,
    pub author: String,
    pub content: String,
    pub attachment_urls: Vec<String>,
}

/// Where a flushed transcript was archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRef {
    pub channel_id: String,
    pub message_id: String,
    pub line_count: usize,
}

/// Render a single line: `[2026-03-01 12:00:00Z] STAFF Jane: hello [+ url]`.
///
/// Embedded newlines are escaped so one message stays one line.
pub fn render_line(line: &TranscriptLine) -> String {
    let mut out = format!(
        "[{}] {} {}: {}",
        line.at.format("%Y-%m-%d %H:%M:%SZ"),
        line.side.label(),
        line.author,
        escape_newlines(&line.content),
    );
    for url in &line.attachment_urls {
        out.push_str(" [+ ");
        out.push_str(url);
        out.push(']');
    }
    out
}

/// Render every line, newline-terminated.
pub fn render(lines: &[TranscriptLine]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&render_line(line));
        out.push('\n');
    }
    out
}

/// File name for an archived transcript.
pub fn transcript_filename(ticket_id: DbId) -> String {
    format!("bridge-{ticket_id}-transcript.txt")
}

fn escape_newlines(s: &str) -> String {
    s.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n")
}
