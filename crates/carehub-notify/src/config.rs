//! Configuration from the environment
//!
//! Settings are read from `CAREHUB_`-prefixed environment variables, after
//! an optional `.env` file has been loaded.
//!
//! # Example
//!
//! ```ignore
//! use carehub_notify::config::{load_dotenv, NotifyConfig};
//!
//! load_dotenv();
//! let config = NotifyConfig::from_env()?;
//! ```

use crate::error::{NotifyError, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CAREHUB_";

/// Environment profile for the application.
///
/// Detected from the `CAREHUB_ENV` environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Development environment with debug logging.
    Development,
    /// Production environment.
    Production,
    /// Custom environment name for specialized deployments.
    Custom(String),
}

impl Environment {
    /// Detect the current environment from `CAREHUB_ENV`.
    ///
    /// - `Production` for "production" or "prod"
    /// - `Development` for "development", "dev", or unset
    /// - `Custom(name)` for anything else
    pub fn current() -> Self {
        match std::env::var("CAREHUB_ENV").as_deref() {
            Ok("production") | Ok("prod") => Self::Production,
            Ok("development") | Ok("dev") => Self::Development,
            Ok(other) => Self::Custom(other.to_string()),
            Err(_) => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Get the environment name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Get the default log level for this environment.
    ///
    /// - Development: "debug"
    /// - Production: "info"
    /// - Custom: "info"
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Development => "debug",
            Self::Production | Self::Custom(_) => "info",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the delay between reconnect attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    /// Same delay every time
    Fixed,
    /// Delay grows by the initial backoff each attempt
    Linear,
    /// Delay doubles each attempt
    #[default]
    Exponential,
}

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One line per event
    #[default]
    Compact,
    /// Multi-line, human-readable
    Pretty,
}

/// Settings for the notification synchronizer.
///
/// | Variable | Default |
/// |----------|---------|
/// | `CAREHUB_API_BASE_URL` | required |
/// | `CAREHUB_SOCKET_URL` | required |
/// | `CAREHUB_REQUEST_TIMEOUT_SECS` | 10 |
/// | `CAREHUB_HEARTBEAT_INTERVAL_SECS` | 30 |
/// | `CAREHUB_HEARTBEAT_TIMEOUT_SECS` | 10 |
/// | `CAREHUB_RECONNECT_STRATEGY` | exponential |
/// | `CAREHUB_RECONNECT_INITIAL_BACKOFF_MS` | 500 |
/// | `CAREHUB_RECONNECT_MAX_BACKOFF_MS` | 30000 |
/// | `CAREHUB_RESYNC_ON_RECONNECT` | false |
/// | `CAREHUB_LOG_FORMAT` | compact |
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Root of the REST API, e.g. `https://api.example.com/api/v1`
    pub api_base_url: String,
    /// Real-time endpoint, e.g. `wss://api.example.com/socket`
    pub socket_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    #[serde(default)]
    pub reconnect_strategy: ReconnectStrategy,
    #[serde(default = "default_initial_backoff_ms")]
    pub reconnect_initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub reconnect_max_backoff_ms: u64,
    /// Refetch and merge the list after the push channel reconnects
    #[serde(default)]
    pub resync_on_reconnect: bool,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl NotifyConfig {
    /// Config with defaults for everything but the two endpoints
    pub fn new(api_base_url: impl Into<String>, socket_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            socket_url: socket_url.into(),
            request_timeout_secs: default_request_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            reconnect_strategy: ReconnectStrategy::default(),
            reconnect_initial_backoff_ms: default_initial_backoff_ms(),
            reconnect_max_backoff_ms: default_max_backoff_ms(),
            resync_on_reconnect: false,
            log_format: LogFormat::default(),
        }
    }

    /// Load from `CAREHUB_*` environment variables
    pub fn from_env() -> Result<Self> {
        let config = envy::prefixed(ENV_PREFIX).from_env::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the push listener cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(NotifyError::config(
                "CAREHUB_HEARTBEAT_INTERVAL_SECS must be at least 1",
            ));
        }
        Ok(())
    }

    /// Load `.env`, then read the environment
    pub fn from_dotenv() -> Result<Self> {
        load_dotenv();
        Self::from_env()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn reconnect_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_backoff_ms)
    }

    pub fn reconnect_max_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_backoff_ms)
    }

    /// Set the reconnect backoff
    pub fn reconnect(mut self, strategy: ReconnectStrategy, initial: Duration, max: Duration) -> Self {
        self.reconnect_strategy = strategy;
        self.reconnect_initial_backoff_ms = initial.as_millis() as u64;
        self.reconnect_max_backoff_ms = max.as_millis() as u64;
        self
    }

    /// Set the heartbeat interval and pong timeout, in whole seconds
    pub fn heartbeat(mut self, interval_secs: u64, timeout_secs: u64) -> Self {
        self.heartbeat_interval_secs = interval_secs;
        self.heartbeat_timeout_secs = timeout_secs;
        self
    }

    /// Enable or disable the post-reconnect resync
    pub fn resync_on_reconnect(mut self, enabled: bool) -> Self {
        self.resync_on_reconnect = enabled;
        self
    }
}

/// Load environment variables from a `.env` file.
///
/// A missing file is not an error; existing variables take precedence.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load environment variables from a specific file path.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}
