use gatehouse_core::bridge::{ClosePolicy, DEFAULT_REOPEN_WINDOW_DAYS};
use gatehouse_core::error::CoreError;

/// Messaging bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Category/parent under which relay channels are created.
    pub relay_parent_id: Option<String>,
    /// Channel transcripts are archived into. Without one, transcripts are
    /// not archived.
    pub transcript_channel_id: Option<String>,
    pub close_policy: ClosePolicy,
    pub reopen_window_days: i64,
    /// Name applicants see on relayed staff messages.
    pub branding_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            relay_parent_id: None,
            transcript_channel_id: None,
            close_policy: ClosePolicy::default(),
            reopen_window_days: DEFAULT_REOPEN_WINDOW_DAYS,
            branding_name: "Gatehouse".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// | Env var                     | Default     |
    /// |-----------------------------|-------------|
    /// | `RELAY_PARENT_ID`           | unset       |
    /// | `TRANSCRIPT_CHANNEL_ID`     | unset       |
    /// | `BRIDGE_CLOSE_POLICY`       | `delete`    |
    /// | `BRIDGE_REOPEN_WINDOW_DAYS` | `7`         |
    /// | `BRANDING_NAME`             | `Gatehouse` |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let close_policy = match std::env::var("BRIDGE_CLOSE_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.close_policy,
        };

        let reopen_window_days = match std::env::var("BRIDGE_REOPEN_WINDOW_DAYS") {
            Ok(raw) => raw.parse::<i64>().ok().filter(|d| *d >= 0).ok_or_else(|| {
                CoreError::Validation(format!(
                    "BRIDGE_REOPEN_WINDOW_DAYS must be a non-negative integer, got '{raw}'"
                ))
            })?,
            Err(_) => defaults.reopen_window_days,
        };

        Ok(Self {
            relay_parent_id: non_empty_var("RELAY_PARENT_ID"),
            transcript_channel_id: non_empty_var("TRANSCRIPT_CHANNEL_ID"),
            close_policy,
            reopen_window_days,
            branding_name: non_empty_var("BRANDING_NAME").unwrap_or(defaults.branding_name),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
