//! # carehub-notify
//!
//! Notification state for the CareHub admin console.
//!
//! This crate keeps the signed-in administrator's notification list and
//! unread count in sync with the backend: it loads the list over REST,
//! receives new notifications over a WebSocket push channel, and applies
//! click-to-read and read-all.
//!
//! ## Features
//!
//! - **Store**: a cloneable, subscribable [`NotificationStore`] whose unread
//!   count is always derived from the list
//! - **REST client**: [`HttpNotificationApi`] behind the [`NotificationApi`] trait
//! - **Push listener**: one connection per session identity, with heartbeat,
//!   reconnect backoff and optional resync
//! - **Surfaces**: [`NotificationCenter`] and [`Surface`] for the bell and the
//!   list page, reporting failures as [`Notice`]s
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use carehub_notify::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> carehub_notify::Result<()> {
//!     let config = NotifyConfig::from_dotenv()?;
//!     init_tracing(config.log_format)?;
//!
//!     let (sessions, session_rx) = session_channel();
//!     let api = Arc::new(HttpNotificationApi::from_config(&config)?);
//!     let center = NotificationCenter::new(api, NotificationStore::new(), session_rx);
//!     let listener = PushListener::spawn(center.clone(), PushConfig::from_config(&config));
//!
//!     sessions.send_replace(Some(Session::new("admin-1").with_token("...")));
//!
//!     let bell = center.mount();
//!     let mut changes = bell.subscribe();
//!     while changes.changed().await.is_ok() {
//!         println!("{:?} unread", badge(changes.borrow().unread_count));
//!     }
//!
//!     listener.shutdown().await;
//!     Ok(())
//! }
//! ```

// Tungstenite errors make the error enum large
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;
pub mod consumer;
pub mod error;
pub mod format;
pub mod logging;
pub mod push;
pub mod record;
pub mod routing;
pub mod session;
pub mod store;

pub use api::{HttpNotificationApi, NotificationApi};
pub use config::{Environment, LogFormat, NotifyConfig, ReconnectStrategy};
pub use consumer::{Notice, NotificationCenter, Surface};
pub use error::{NotifyError, Result};
pub use format::{avatar_initial, badge, sender_label, time_ago};
pub use logging::init_tracing;
pub use push::{ConnectionStatus, PushConfig, PushListener, PushListenerHandle};
pub use record::{NotificationKind, NotificationRecord, Sender};
pub use routing::{Destination, RouteTable};
pub use session::{session_channel, Session, SessionReceiver, SessionSender};
pub use store::{LoadTicket, NotificationState, NotificationStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        badge, init_tracing, session_channel, ConnectionStatus, Destination, HttpNotificationApi,
        Notice, NotificationApi, NotificationCenter, NotificationKind, NotificationRecord,
        NotificationState, NotificationStore, NotifyConfig, NotifyError, PushConfig, PushListener,
        PushListenerHandle, Session, Surface,
    };
}
