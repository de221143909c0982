//! Session identity shared by REST calls and the push channel

use tokio::sync::watch;

/// The signed-in user
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Session identity
    pub user_id: String,
    /// Bearer credential, if the backend issued one
    pub token: Option<String>,
}

impl Session {
    /// Session without a bearer credential
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: None,
        }
    }

    /// Attach a bearer credential
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

// Keep credentials out of logs
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Publishes the current session; `None` means signed out
pub type SessionSender = watch::Sender<Option<Session>>;

/// Observes the current session
pub type SessionReceiver = watch::Receiver<Option<Session>>;

/// Create a session channel, initially signed out
pub fn session_channel() -> (SessionSender, SessionReceiver) {
    watch::channel(None)
}
