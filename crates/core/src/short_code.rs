//! Six-character case short codes.
//!
//! A short code is the first three bytes of `SHA-256(case_id)` rendered as
//! upper-case hex, giving 16^6 (about 16.7M) codes per workspace. Staff type
//! these by hand, so lookups go through [`normalize_code`] first.

use sha2::{Digest, Sha256};

/// Number of hex characters in a short code.
pub const SHORT_CODE_LEN: usize = 6;

/// Reasons a short code cannot be derived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShortCodeError {
    #[error("case id is empty")]
    EmptyId,
    #[error("case id '{0}' has surrounding whitespace")]
    UntrimmedId(String),
}

/// Derive the short code for a case id.
pub fn derive_short_code(case_id: &str) -> Result<String, ShortCodeError> {
    if case_id.is_empty() {
        return Err(ShortCodeError::EmptyId);
    }
    if case_id.trim() != case_id {
        return Err(ShortCodeError::UntrimmedId(case_id.to_string()));
    }
    let digest = Sha256::digest(case_id.as_bytes());
    Ok(digest[..SHORT_CODE_LEN / 2]
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect())
}

/// Upper-case, drop every non-hex character, and keep at most six characters.
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(char::is_ascii_hexdigit)
        .take(SHORT_CODE_LEN)
        .collect()
}

/// Whether a normalized code has the full six characters.
pub fn is_complete(code: &str) -> bool {
    code.len() == SHORT_CODE_LEN
}
