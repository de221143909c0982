//! Where opening a notification leads

use crate::record::{NotificationKind, NotificationRecord};
use std::fmt;

/// An in-app path to navigate to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination(String);

impl Destination {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps notification kinds to destinations.
///
/// | kind | destination |
/// |------|-------------|
/// | `provider_registeration` | `{users}/view/{sender id}` |
/// | `complaint` | `{complaints}` |
/// | booking and appointment kinds | `{service_requests}/view/{related id}` |
///
/// Without the id a view route needs, the list page is used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    users: String,
    complaints: String,
    service_requests: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            users: "/users".to_string(),
            complaints: "/complaints".to_string(),
            service_requests: "/ServiceRequests".to_string(),
        }
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the users list page
    pub fn users(mut self, path: impl Into<String>) -> Self {
        self.users = path.into();
        self
    }

    /// Set the complaints page
    pub fn complaints(mut self, path: impl Into<String>) -> Self {
        self.complaints = path.into();
        self
    }

    /// Set the service requests list page
    pub fn service_requests(mut self, path: impl Into<String>) -> Self {
        self.service_requests = path.into();
        self
    }

    /// Destination for `record`, or `None` for kinds with no page
    pub fn resolve(&self, record: &NotificationRecord) -> Option<Destination> {
        let destination = match &record.kind {
            NotificationKind::ProviderRegistration => {
                let sender_id = record.sender.as_ref().and_then(|s| s.id.as_deref());
                view_or_list(&self.users, sender_id)
            }
            NotificationKind::Complaint => Destination::new(&self.complaints),
            kind if kind.is_booking_lifecycle() => {
                view_or_list(&self.service_requests, record.related_id.as_deref())
            }
            kind => {
                tracing::warn!(id = %record.id, kind = %kind, "no route for notification kind");
                return None;
            }
        };
        Some(destination)
    }
}

fn view_or_list(list: &str, id: Option<&str>) -> Destination {
    match id {
        Some(id) if !id.is_empty() => Destination::new(format!("{}/view/{}", list, id)),
        _ => Destination::new(list),
    }
}
