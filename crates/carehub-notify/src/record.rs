//! Notification records as the backend sends them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single notification addressed to the signed-in user.
///
/// Field names follow the backend's JSON (`_id`, `senderId`, `type`,
/// `createdAt`, ...). Only `seen` is ever changed on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Opaque unique identity
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning user, scoped by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    /// Snapshot of the sending actor
    #[serde(
        rename = "senderId",
        default,
        deserialize_with = "deserialize_sender",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender: Option<Sender>,
    /// What happened
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Pre-rendered text
    pub message: String,
    /// Entity the notification is about, interpreted per `kind`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    /// Free-form extra payload, carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub seen: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Create an unseen record
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<NotificationKind>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            recipient_id: None,
            sender: None,
            kind: kind.into(),
            message: message.into(),
            related_id: None,
            data: None,
            seen: false,
            created_at,
            updated_at: None,
        }
    }

    /// Set the seen flag
    pub fn with_seen(mut self, seen: bool) -> Self {
        self.seen = seen;
        self
    }

    /// Attach a sender snapshot
    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Attach the related entity id
    pub fn with_related_id(mut self, related_id: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self
    }
}

/// Denormalized snapshot of whoever triggered the notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}

impl Sender {
    /// Sender known only by id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Whether the sender is a care provider
    pub fn is_provider(&self) -> bool {
        self.role.as_deref() == Some("provider")
    }

    /// Avatar URL, if one was uploaded
    pub fn avatar_url(&self) -> Option<&str> {
        self.image.as_ref()?.url.as_deref()
    }
}

/// Uploaded image reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The backend sends either a populated sender object or just its id.
#[derive(Deserialize)]
#[serde(untagged)]
enum SenderRepr {
    Id(String),
    Full(Sender),
}

fn deserialize_sender<'de, D>(deserializer: D) -> Result<Option<Sender>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<SenderRepr>::deserialize(deserializer)?.map(|repr| match repr {
            SenderRepr::Id(id) => Sender::with_id(id),
            SenderRepr::Full(sender) => sender,
        }),
    )
}

/// Notification kind.
///
/// The set is owned by the backend; values this client does not know are
/// kept verbatim in [`NotificationKind::Other`] instead of failing decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    /// A provider signed up and awaits approval
    ProviderRegistration,
    /// A complaint was filed
    Complaint,
    BookingCreated,
    BookingAccepted,
    BookingRejected,
    BookingUpdated,
    BookingCancelled,
    AppointmentCreated,
    AppointmentCancelled,
    AppointmentCompleted,
    FollowupBooked,
    /// Anything else the backend sends
    Other(String),
}

impl NotificationKind {
    /// Wire name
    pub fn as_str(&self) -> &str {
        match self {
            // Backend spelling
            Self::ProviderRegistration => "provider_registeration",
            Self::Complaint => "complaint",
            Self::BookingCreated => "booking_created",
            Self::BookingAccepted => "booking_accepted",
            Self::BookingRejected => "booking_rejected",
            Self::BookingUpdated => "booking_updated",
            Self::BookingCancelled => "booking_cancelled",
            Self::AppointmentCreated => "appointment_created",
            Self::AppointmentCancelled => "appointment_cancelled",
            Self::AppointmentCompleted => "appointment_completed",
            Self::FollowupBooked => "followup_booked",
            Self::Other(other) => other,
        }
    }

    /// Booking and appointment lifecycle events
    pub fn is_booking_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::BookingCreated
                | Self::BookingAccepted
                | Self::BookingRejected
                | Self::BookingUpdated
                | Self::BookingCancelled
                | Self::AppointmentCreated
                | Self::AppointmentCancelled
                | Self::AppointmentCompleted
                | Self::FollowupBooked
        )
    }
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "provider_registeration" => Self::ProviderRegistration,
            "complaint" => Self::Complaint,
            "booking_created" => Self::BookingCreated,
            "booking_accepted" => Self::BookingAccepted,
            "booking_rejected" => Self::BookingRejected,
            "booking_updated" => Self::BookingUpdated,
            "booking_cancelled" => Self::BookingCancelled,
            "appointment_created" => Self::AppointmentCreated,
            "appointment_cancelled" => Self::AppointmentCancelled,
            "appointment_completed" => Self::AppointmentCompleted,
            "followup_booked" => Self::FollowupBooked,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_backend_payload() {
        let record: NotificationRecord = serde_json::from_value(json!({
            "_id": "66f1",
            "recipientId": "admin-1",
            "senderId": {
                "_id": "u-9",
                "firstName": "amira",
                "role": "provider",
                "image": { "url": "https://cdn.example/a.png" }
            },
            "type": "provider_registeration",
            "message": "New provider registered",
            "relatedId": null,
            "seen": false,
            "createdAt": "2025-03-01T10:00:00.000Z",
            "updatedAt": "2025-03-01T10:00:00.000Z",
            "__v": 0
        }))
        .unwrap();

        assert_eq!(record.id, "66f1");
        assert_eq!(record.kind, NotificationKind::ProviderRegistration);
        assert_eq!(record.related_id, None);
        let sender = record.sender.unwrap();
        assert!(sender.is_provider());
        assert_eq!(sender.avatar_url(), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn accepts_bare_sender_id() {
        let record: NotificationRecord = serde_json::from_value(json!({
            "_id": "n1",
            "senderId": "u-1",
            "type": "complaint",
            "message": "m",
            "createdAt": "2025-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.sender, Some(Sender::with_id("u-1")));
        assert!(!record.seen);
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let record: NotificationRecord = serde_json::from_value(json!({
            "_id": "n1",
            "type": "payout_sent",
            "message": "m",
            "createdAt": "2025-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.kind, NotificationKind::Other("payout_sent".into()));
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["type"], "payout_sent");
    }

    #[test]
    fn booking_kinds_are_lifecycle() {
        assert!(NotificationKind::from("booking_cancelled").is_booking_lifecycle());
        assert!(NotificationKind::from("followup_booked").is_booking_lifecycle());
        assert!(!NotificationKind::Complaint.is_booking_lifecycle());
    }
}
