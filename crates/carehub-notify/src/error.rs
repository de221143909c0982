//! Error types

use thiserror::Error;

/// Error type for notification operations
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Real-time channel failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A configured URL is malformed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation needs a signed-in session
    #[error("No active session")]
    NoSession,
}

impl NotifyError {
    /// Create a status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure is on the network path rather than in the payload
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::WebSocket(_))
    }
}

impl From<envy::Error> for NotifyError {
    fn from(err: envy::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias for notification operations
pub type Result<T, E = NotifyError> = std::result::Result<T, E>;
