//! Notification store
//!
//! The single source of truth for the notification list and its unread
//! count. A [`NotificationStore`] is a cheap handle: clone it into every
//! surface that needs it, and [`subscribe`](NotificationStore::subscribe) to
//! be told when the state changes.
//!
//! # Example
//!
//! ```rust,ignore
//! use carehub_notify::{NotificationRecord, NotificationStore};
//!
//! let store = NotificationStore::new();
//! let mut rx = store.subscribe();
//!
//! store.replace_all(fetched);
//! store.prepend_one(pushed);
//!
//! rx.changed().await?;
//! println!("{} unread", rx.borrow().unread_count);
//! ```

use crate::record::NotificationRecord;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Snapshot of the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    /// Newest first, unique by id
    pub items: Vec<NotificationRecord>,
    /// Always equals the number of items with `seen == false`
    pub unread_count: usize,
    /// A list fetch is in flight
    pub loading: bool,
}

impl NotificationState {
    /// Look up a record by id
    pub fn get(&self, id: &str) -> Option<&NotificationRecord> {
        self.items.iter().find(|r| r.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|r| r.id == id)
    }

    fn recount(&mut self) {
        self.unread_count = self.items.iter().filter(|r| !r.seen).count();
    }

    /// Insert or update by id. Returns true when a new record was inserted.
    ///
    /// An existing record is updated in place; `seen` never goes back to false.
    fn upsert_front(&mut self, mut record: NotificationRecord) -> Upsert {
        match self.position(&record.id) {
            Some(idx) => {
                let existing = &mut self.items[idx];
                record.seen |= existing.seen;
                if *existing == record {
                    Upsert::Unchanged
                } else {
                    *existing = record;
                    Upsert::Updated
                }
            }
            None => {
                self.items.insert(0, record);
                Upsert::Inserted
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// Issued by [`NotificationStore::begin_load`]; identifies one list fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

#[derive(Debug, Default)]
struct LoadSequence {
    latest: u64,
    /// Ids prepended while the latest load is in flight
    pending: Option<HashSet<String>>,
}

/// Handle to the notification store
#[derive(Debug, Clone)]
pub struct NotificationStore {
    state: Arc<watch::Sender<NotificationState>>,
    // Only locked from inside `state` modify closures
    sequence: Arc<Mutex<LoadSequence>>,
}

impl NotificationStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (state, _) = watch::channel(NotificationState::default());
        Self {
            state: Arc::new(state),
            sequence: Arc::new(Mutex::new(LoadSequence::default())),
        }
    }

    /// Receive the current state and every later change
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Clone of one record
    pub fn get(&self, id: &str) -> Option<NotificationRecord> {
        self.state.borrow().get(id).cloned()
    }

    /// Replace the whole list with a fetched batch
    pub fn replace_all(&self, records: Vec<NotificationRecord>) {
        self.state.send_modify(|state| {
            state.items = dedup_by_id(records);
            state.recount();
        });
    }

    /// Insert a newly observed record at the head.
    ///
    /// A record whose id is already present updates that entry in place
    /// instead of being duplicated. Returns true if the record was new.
    pub fn prepend_one(&self, record: NotificationRecord) -> bool {
        let mut inserted = false;
        self.state.send_if_modified(|state| {
            let id = record.id.clone();
            let outcome = state.upsert_front(record);
            if outcome == Upsert::Unchanged {
                return false;
            }
            if outcome == Upsert::Inserted {
                inserted = true;
                self.with_sequence(|seq| {
                    if let Some(pending) = seq.pending.as_mut() {
                        pending.insert(id);
                    }
                });
            }
            state.recount();
            true
        });
        inserted
    }

    /// Mark one record seen. No-op if it is missing or already seen.
    pub fn mark_one_seen(&self, id: &str) -> bool {
        self.state.send_if_modified(|state| {
            let Some(record) = state.items.iter_mut().find(|r| r.id == id) else {
                return false;
            };
            if record.seen {
                return false;
            }
            record.seen = true;
            state.recount();
            true
        })
    }

    /// Mark every record seen. No-op if nothing is unread.
    pub fn mark_all_seen(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.items.iter().all(|r| r.seen) {
                return false;
            }
            state.items.iter_mut().for_each(|r| r.seen = true);
            state.unread_count = 0;
            true
        })
    }

    /// Upsert a batch by id and restore newest-first order.
    ///
    /// Used to fill a gap after the push channel reconnects.
    pub fn merge(&self, records: Vec<NotificationRecord>) -> usize {
        let mut inserted = 0;
        self.state.send_if_modified(|state| {
            let mut changed = false;
            for record in records {
                match state.upsert_front(record) {
                    Upsert::Inserted => {
                        inserted += 1;
                        changed = true;
                    }
                    Upsert::Updated => changed = true,
                    Upsert::Unchanged => {}
                }
            }
            if changed {
                state.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                state.recount();
            }
            changed
        });
        inserted
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    /// Start a sequenced list fetch.
    ///
    /// Only the most recently issued ticket may apply its result; see
    /// [`finish_load`](Self::finish_load).
    pub fn begin_load(&self) -> LoadTicket {
        let mut ticket = LoadTicket(0);
        self.state.send_modify(|state| {
            self.with_sequence(|seq| {
                seq.latest += 1;
                seq.pending = Some(HashSet::new());
                ticket = LoadTicket(seq.latest);
            });
            state.loading = true;
        });
        ticket
    }

    /// Apply the result of a sequenced fetch.
    ///
    /// Discarded (returns false) when a newer load was started after
    /// `ticket`. Records prepended while the fetch was in flight and missing
    /// from `records` stay at the head.
    pub fn finish_load(&self, ticket: LoadTicket, records: Vec<NotificationRecord>) -> bool {
        self.state.send_if_modified(|state| {
            let Some(pushed) = self.with_sequence(|seq| {
                if seq.latest == ticket.0 {
                    Some(seq.pending.take().unwrap_or_default())
                } else {
                    None
                }
            }) else {
                tracing::debug!(ticket = ticket.0, "discarding stale notification load");
                return false;
            };

            let batch = dedup_by_id(records);
            let fetched: HashSet<&str> = batch.iter().map(|r| r.id.as_str()).collect();
            let mut items: Vec<NotificationRecord> = state
                .items
                .iter()
                .filter(|r| pushed.contains(&r.id) && !fetched.contains(r.id.as_str()))
                .cloned()
                .collect();
            items.extend(batch);

            state.items = items;
            state.recount();
            state.loading = false;
            true
        })
    }

    /// End a sequenced fetch that produced no result
    pub fn abandon_load(&self, ticket: LoadTicket) {
        self.state.send_if_modified(|state| {
            let current = self.with_sequence(|seq| {
                let current = seq.latest == ticket.0;
                if current {
                    seq.pending = None;
                }
                current
            });
            if current && state.loading {
                state.loading = false;
                return true;
            }
            false
        });
    }

    fn with_sequence<R>(&self, f: impl FnOnce(&mut LoadSequence) -> R) -> R {
        let mut seq = self
            .sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut seq)
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_by_id(records: Vec<NotificationRecord>) -> Vec<NotificationRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}
