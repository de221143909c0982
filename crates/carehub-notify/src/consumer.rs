//! Read and write surfaces for the UI
//!
//! A [`NotificationCenter`] ties the REST client, the store and the current
//! session together. Each UI surface (the bell dropdown, the full list page)
//! [`mount`](NotificationCenter::mount)s its own [`Surface`]; results of calls
//! still in flight when the surface unmounts are not applied.
//!
//! Failures never propagate to the caller. They are logged and published as
//! [`Notice`]s for whoever shows toasts.

use crate::api::NotificationApi;
use crate::error::{NotifyError, Result};
use crate::record::NotificationRecord;
use crate::routing::{Destination, RouteTable};
use crate::session::{Session, SessionReceiver};
use crate::store::{NotificationState, NotificationStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const NOTICE_CAPACITY: usize = 32;

/// User-facing message about a failed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The list could not be fetched; what is shown is unchanged
    LoadFailed { reason: String },
    /// A mark-seen call failed
    ActionFailed { reason: String },
}

impl Notice {
    /// Text for a toast
    pub fn message(&self) -> &'static str {
        match self {
            Self::LoadFailed { .. } => "Could not load notifications, reload to retry",
            Self::ActionFailed { .. } => "Could not update notifications",
        }
    }

    /// Underlying error, for logs
    pub fn reason(&self) -> &str {
        match self {
            Self::LoadFailed { reason } | Self::ActionFailed { reason } => reason,
        }
    }
}

/// Gate for applying async results
#[derive(Debug, Clone)]
struct Mount(Option<Arc<AtomicBool>>);

impl Mount {
    fn always() -> Self {
        Self(None)
    }

    fn is_live(&self) -> bool {
        self.0
            .as_ref()
            .map_or(true, |mounted| mounted.load(Ordering::Acquire))
    }
}

/// Shared entry point for every notification surface
#[derive(Clone)]
pub struct NotificationCenter {
    api: Arc<dyn NotificationApi>,
    store: NotificationStore,
    sessions: SessionReceiver,
    routes: RouteTable,
    notices: broadcast::Sender<Notice>,
}

impl NotificationCenter {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        store: NotificationStore,
        sessions: SessionReceiver,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            api,
            store,
            sessions,
            routes: RouteTable::default(),
            notices,
        }
    }

    /// Replace the route table
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// A fresh receiver on the session channel
    pub fn sessions(&self) -> SessionReceiver {
        self.sessions.clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.sessions.borrow().clone()
    }

    /// Observe store changes
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.store.subscribe()
    }

    /// Receive failure notices
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Create a surface bound to this center
    pub fn mount(&self) -> Surface {
        Surface {
            center: self.clone(),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Fetch the list and replace the store contents.
    ///
    /// Does nothing when signed out. Returns whether the fetched list was
    /// applied.
    pub async fn load(&self) -> bool {
        self.load_with(&Mount::always()).await
    }

    /// Mark `record` seen if needed and resolve where it leads
    pub async fn open_and_mark(&self, record: &NotificationRecord) -> Option<Destination> {
        self.open_and_mark_with(record, &Mount::always()).await
    }

    /// Reload the list and mark everything seen
    pub async fn open_list_and_mark_all(&self) {
        self.open_list_and_mark_all_with(&Mount::always()).await
    }

    /// Fetch the list and merge it into the store without dropping anything.
    ///
    /// Returns the number of records that were not known before.
    pub async fn resync(&self) -> Result<usize> {
        let session = self.current_session().ok_or(NotifyError::NoSession)?;
        let records = self.api.fetch_all(&session).await?;
        if self.current_session().as_ref() != Some(&session) {
            return Ok(0);
        }
        Ok(self.store.merge(records))
    }

    async fn load_with(&self, mount: &Mount) -> bool {
        let Some(session) = self.current_session() else {
            tracing::debug!("skipping notification load without a session");
            return false;
        };

        let ticket = self.store.begin_load();
        match self.api.fetch_all(&session).await {
            Ok(records) => {
                if !mount.is_live() || self.current_session().as_ref() != Some(&session) {
                    self.store.abandon_load(ticket);
                    return false;
                }
                self.store.finish_load(ticket, records)
            }
            Err(err) => {
                tracing::warn!(user_id = %session.user_id, error = %err, "failed to load notifications");
                self.store.abandon_load(ticket);
                if mount.is_live() {
                    self.notify(Notice::LoadFailed {
                        reason: err.to_string(),
                    });
                }
                false
            }
        }
    }

    async fn open_and_mark_with(
        &self,
        record: &NotificationRecord,
        mount: &Mount,
    ) -> Option<Destination> {
        if !record.seen {
            match self.mark_seen_remote(&record.id).await {
                Ok(()) => {
                    if mount.is_live() {
                        self.store.mark_one_seen(&record.id);
                    }
                }
                Err(err) => {
                    tracing::warn!(id = %record.id, error = %err, "failed to mark notification seen");
                    if mount.is_live() {
                        self.notify(Notice::ActionFailed {
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        self.routes.resolve(record)
    }

    async fn open_list_and_mark_all_with(&self, mount: &Mount) {
        let Some(session) = self.current_session() else {
            tracing::debug!("skipping mark-all without a session");
            return;
        };

        self.load_with(mount).await;
        if !mount.is_live() {
            return;
        }

        // Applied before the request resolves and kept on failure
        self.store.mark_all_seen();

        if let Err(err) = self.api.mark_all_seen(&session).await {
            tracing::warn!(user_id = %session.user_id, error = %err, "failed to mark all notifications seen");
            if mount.is_live() {
                self.notify(Notice::ActionFailed {
                    reason: err.to_string(),
                });
            }
        }
    }

    async fn mark_seen_remote(&self, id: &str) -> Result<()> {
        let session = self.current_session().ok_or(NotifyError::NoSession)?;
        let updated = self.api.mark_seen(&session, id).await?;
        tracing::debug!(id = %updated.id, seen = updated.seen, "notification marked seen");
        Ok(())
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("store", &self.store)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// One mounted UI surface
#[derive(Debug, Clone)]
pub struct Surface {
    center: NotificationCenter,
    mounted: Arc<AtomicBool>,
}

impl Surface {
    /// Current store contents
    pub fn state(&self) -> NotificationState {
        self.center.store.snapshot()
    }

    /// Observe store changes
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.center.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Stop applying results of calls still in flight
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    /// See [`NotificationCenter::load`]
    pub async fn load(&self) -> bool {
        self.center.load_with(&self.mount_gate()).await
    }

    /// See [`NotificationCenter::open_and_mark`]
    pub async fn open_and_mark(&self, record: &NotificationRecord) -> Option<Destination> {
        self.center
            .open_and_mark_with(record, &self.mount_gate())
            .await
    }

    /// See [`NotificationCenter::open_list_and_mark_all`]
    pub async fn open_list_and_mark_all(&self) {
        self.center
            .open_list_and_mark_all_with(&self.mount_gate())
            .await
    }

    fn mount_gate(&self) -> Mount {
        Mount(Some(self.mounted.clone()))
    }
}
