use axum::http::HeaderValue;
use gatehouse_core::error::CoreError;
use gatehouse_review::BridgeConfig;

/// Where the platform gateway lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: Option<String>,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Without
/// `GATEWAY_URL` the server runs against the in-memory loopback gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after the listener closes.
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    pub db_max_connections: u32,
    pub gateway: Option<GatewayConfig>,
    /// Bearer token callers must present. Unset disables the check.
    pub api_token: Option<String>,
    pub bridge: BridgeConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `3000`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                     |
    /// | `DATABASE_URL`          | `sqlite://gatehouse.db`  |
    /// | `DB_MAX_CONNECTIONS`    | `1`                      |
    /// | `GATEWAY_URL`           | unset (loopback gateway) |
    /// | `GATEWAY_TOKEN`         | unset                    |
    /// | `API_TOKEN`             | unset (no auth)          |
    ///
    /// Bridge settings are read by [`BridgeConfig::from_env`].
    pub fn from_env() -> Result<Self, CoreError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("PORT", 3000u16)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            HeaderValue::from_str(origin).map_err(|e| {
                CoreError::Validation(format!("Invalid CORS origin '{origin}': {e}"))
            })?;
        }

        let gateway = non_empty_var("GATEWAY_URL").map(|url| GatewayConfig {
            url: url.trim_end_matches('/').to_string(),
            token: non_empty_var("GATEWAY_TOKEN"),
        });

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30u64)?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", 30u64)?,
            database_url: non_empty_var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://gatehouse.db".into()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 1u32)?,
            gateway,
            api_token: non_empty_var("API_TOKEN"),
            bridge: BridgeConfig::from_env()?,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}
