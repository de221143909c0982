//! Real-time delivery of new notifications
//!
//! A [`PushListener`] keeps one WebSocket open to the backend for the
//! signed-in user and prepends every `notification:new` event to the store.
//!
//! ## Connection lifecycle
//!
//! - Signed out: no connection.
//! - Signed in: the list is loaded first, then `{socket_url}?userId={id}` is
//!   opened with the session's bearer token on the handshake.
//! - Identity or token change: the open connection is closed, then a new one
//!   is opened for the new session.
//! - Drop or heartbeat timeout: reconnect after a [`Backoff`] delay, and
//!   optionally refetch the list to fill the gap.
//!
//! ```rust,ignore
//! let handle = PushListener::spawn(center.clone(), PushConfig::from_config(&config));
//! // ...
//! handle.shutdown().await;
//! ```

mod backoff;
mod envelope;
mod heartbeat;
mod listener;

pub use backoff::Backoff;
pub use envelope::{PushEvent, NEW_NOTIFICATION};
pub use heartbeat::{HeartbeatConfig, MIN_PING_INTERVAL};
pub use listener::{ConnectionStatus, PushConfig, PushListener, PushListenerHandle};
