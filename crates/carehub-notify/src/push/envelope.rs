//! Push frame decoding
//!
//! Every text frame is a JSON envelope `{"event": "...", "data": ...}`.

use crate::error::Result;
use crate::record::NotificationRecord;
use serde::Deserialize;

/// Event name carrying a newly created notification
pub const NEW_NOTIFICATION: &str = "notification:new";

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A decoded push frame
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A notification for the connected user
    NewNotification(NotificationRecord),
    /// Any other event, by name
    Other(String),
}

impl PushEvent {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if envelope.event == NEW_NOTIFICATION {
            let record = serde_json::from_value(envelope.data)?;
            return Ok(Self::NewNotification(record));
        }
        Ok(Self::Other(envelope.event))
    }
}
