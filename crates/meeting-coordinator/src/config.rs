//! Meeting Coordinator configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP + WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default interval between server-initiated transport pings.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 25;

/// Default silence after which a connection is treated as disconnected.
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECONDS: u64 = 60;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Default audio level above which a speaker is auto-spotlighted.
pub const DEFAULT_AUTO_SPOTLIGHT_THRESHOLD: f32 = 0.3;

/// Extra TURN relay supplied by the deployment environment.
#[derive(Clone, Debug)]
pub struct TurnServerConfig {
    /// TURN URL (e.g., `turn:turn.example.com:3478`).
    pub url: String,
    /// TURN username.
    pub username: String,
    /// TURN credential. Protected by `SecretString` to prevent accidental logging.
    pub credential: SecretString,
}

/// Meeting Coordinator configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// HTTP + WebSocket bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Interval between server pings on each WebSocket.
    pub heartbeat_interval: Duration,

    /// Silence (no inbound frame) after which a connection is dropped.
    pub heartbeat_timeout: Duration,

    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,

    /// Audio level threshold for auto-spotlight (strictly greater than).
    pub auto_spotlight_threshold: f32,

    /// Optional bearer token required on the HTTP API.
    /// When unset, the HTTP API is open (authentication is delegated upstream).
    pub api_token: Option<SecretString>,

    /// Optional TURN relay appended to every meeting's ICE server list.
    pub turn_server: Option<TurnServerConfig>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .field("outbound_buffer", &self.outbound_buffer)
            .field("auto_spotlight_threshold", &self.auto_spotlight_threshold)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "turn_server",
                &self.turn_server.as_ref().map(|t| t.url.as_str()),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            health_bind_address: DEFAULT_HEALTH_BIND_ADDRESS.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECONDS),
            heartbeat_timeout: Duration::from_secs(DEFAULT_HEARTBEAT_TIMEOUT_SECONDS),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            auto_spotlight_threshold: DEFAULT_AUTO_SPOTLIGHT_THRESHOLD,
            api_token: None,
            turn_server: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("COORD_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("COORD_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let heartbeat_interval_seconds: u64 = parse_var(
            vars,
            "COORD_HEARTBEAT_INTERVAL_SECONDS",
            DEFAULT_HEARTBEAT_INTERVAL_SECONDS,
        )?;
        let heartbeat_timeout_seconds: u64 = parse_var(
            vars,
            "COORD_HEARTBEAT_TIMEOUT_SECONDS",
            DEFAULT_HEARTBEAT_TIMEOUT_SECONDS,
        )?;

        if heartbeat_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "COORD_HEARTBEAT_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }
        if heartbeat_timeout_seconds <= heartbeat_interval_seconds {
            return Err(ConfigError::InvalidValue(
                "COORD_HEARTBEAT_TIMEOUT_SECONDS must exceed the heartbeat interval".to_string(),
            ));
        }

        let outbound_buffer: usize =
            parse_var(vars, "COORD_OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "COORD_OUTBOUND_BUFFER must be greater than zero".to_string(),
            ));
        }

        let auto_spotlight_threshold: f32 = parse_var(
            vars,
            "COORD_AUTO_SPOTLIGHT_THRESHOLD",
            DEFAULT_AUTO_SPOTLIGHT_THRESHOLD,
        )?;
        if !(0.0..=1.0).contains(&auto_spotlight_threshold) {
            return Err(ConfigError::InvalidValue(
                "COORD_AUTO_SPOTLIGHT_THRESHOLD must be within [0, 1]".to_string(),
            ));
        }

        let api_token = vars
            .get("COORD_API_TOKEN")
            .filter(|token| !token.is_empty())
            .map(|token| SecretString::from(token.clone()));

        // The TURN relay is only used when all three variables are present.
        let turn_server = match (
            vars.get("TURN_SERVER_URL"),
            vars.get("TURN_USERNAME"),
            vars.get("TURN_CREDENTIAL"),
        ) {
            (Some(url), Some(username), Some(credential))
                if !url.is_empty() && !username.is_empty() && !credential.is_empty() =>
            {
                Some(TurnServerConfig {
                    url: url.clone(),
                    username: username.clone(),
                    credential: SecretString::from(credential.clone()),
                })
            }
            _ => None,
        };

        Ok(Config {
            bind_address,
            health_bind_address,
            heartbeat_interval: Duration::from_secs(heartbeat_interval_seconds),
            heartbeat_timeout: Duration::from_secs(heartbeat_timeout_seconds),
            outbound_buffer,
            auto_spotlight_threshold,
            api_token,
            turn_server,
        })
    }
}

/// Parse an optional variable, falling back to `default` when absent.
fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw}"))),
        None => Ok(default),
    }
}
