//! The signed-in user's bookmarks, kept in step with the store.
//!
//! Every toggle is a small transaction over one entry of the set: snapshot,
//! apply the tentative state, commit remotely, restore the snapshot if the
//! commit fails. Sign-in/out bumps an epoch so that loads and commits that
//! resolve for a previous session can't write into the current one.

use crate::error::{Error, ErrorKind, Result};
use crate::model::{CatalogKind, ItemId, ListableItem};
use crate::notify::{Notification, Notifier};
use crate::session::Session;
use curio_store::{Condition, Query, Record, StoreHandle, lookup};
use exn::{OptionExt, ResultExt};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tracing::instrument;

pub(crate) const BOOKMARK_TABLE: &str = "bookmark";

/// One bookmark row. `id` and `created_at` are whatever the store returned;
/// an entry that hasn't been confirmed yet has no `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub id: Option<i64>,
    pub item: ItemId,
    pub created_at: Option<String>,
}

impl Bookmark {
    /// Read a `bookmark` row for the given kind. Rows that reference another
    /// kind of item (their column for this kind is null) yield `None`.
    pub fn from_record(kind: CatalogKind, record: &Record) -> Option<Self> {
        let item = lookup(record, kind.bookmark_column())?.as_i64()?;
        Some(Self {
            id: lookup(record, "id").and_then(|id| id.as_i64()),
            item: ItemId(item),
            created_at: lookup(record, "created_at").and_then(|at| at.as_str()).map(str::to_string),
        })
    }
}

/// Bookmarks of one kind, keyed by item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkSet {
    entries: BTreeMap<ItemId, Bookmark>,
}

impl BookmarkSet {
    pub fn contains(&self, item: ItemId) -> bool {
        self.entries.contains_key(&item)
    }

    pub fn get(&self, item: ItemId) -> Option<&Bookmark> {
        self.entries.get(&item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bookmarked item ids, ascending.
    pub fn ids(&self) -> Vec<ItemId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.values()
    }

    fn insert(&mut self, bookmark: Bookmark) -> Option<Bookmark> {
        self.entries.insert(bookmark.item, bookmark)
    }

    fn remove(&mut self, item: ItemId) -> Option<Bookmark> {
        self.entries.remove(&item)
    }
}

impl FromIterator<Bookmark> for BookmarkSet {
    fn from_iter<I: IntoIterator<Item = Bookmark>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|bookmark| (bookmark.item, bookmark)).collect(),
        }
    }
}

/// Where the bookmark set is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No session; the set is empty and stays empty.
    Idle,
    Loading,
    Ready,
    /// The load failed. The set is treated as loaded and empty.
    Failed,
}

impl SyncPhase {
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// What a call to [`BookmarkSync::toggle()`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// No session; nothing was attempted.
    AuthRequired,
    /// A toggle of the same item is still outstanding; nothing was attempted.
    Busy,
    /// The store refused or failed; the set was restored.
    Failed,
}

impl ToggleOutcome {
    /// Whether the bookmark set changed as a result.
    pub fn committed(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

/// Snapshot of the bookmark set as the page fetcher needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Membership {
    SignedOut,
    Loading,
    Loaded(Vec<ItemId>),
}

#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<Session>,
    epoch: u64,
    /// Loads started for this session that haven't resolved yet.
    loads: usize,
    /// Entries written by toggles while a load was running. The load's rows
    /// predate them, so they're applied on top of whatever it returns.
    journal: BTreeMap<ItemId, Option<Bookmark>>,
}

pub struct BookmarkSync {
    kind: CatalogKind,
    store: StoreHandle,
    notifier: Arc<dyn Notifier>,
    slot: Mutex<SessionSlot>,
    set: watch::Sender<BookmarkSet>,
    phase: watch::Sender<SyncPhase>,
    pending: Mutex<HashSet<ItemId>>,
}

impl BookmarkSync {
    pub fn new(kind: CatalogKind, store: StoreHandle, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            kind,
            store,
            notifier,
            slot: Mutex::new(SessionSlot::default()),
            set: watch::Sender::new(BookmarkSet::default()),
            phase: watch::Sender::new(SyncPhase::Idle),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.slot().session.clone()
    }

    /// Switch to a new session (or none), dropping the current set. With a
    /// session the phase moves to [`SyncPhase::Loading`] until
    /// [`load()`](Self::load) completes.
    pub fn set_session(&self, session: Option<Session>) {
        let phase = if session.is_some() { SyncPhase::Loading } else { SyncPhase::Idle };
        let mut slot = self.slot();
        slot.session = session;
        slot.epoch += 1;
        slot.loads = 0;
        slot.journal.clear();
        self.set.send_replace(BookmarkSet::default());
        self.phase.send_replace(phase);
    }

    /// Forget the session and everything loaded for it.
    pub fn clear(&self) {
        self.set_session(None);
    }

    /// Fetch every bookmark of this kind for the current session. Without a
    /// session this does nothing.
    ///
    /// Toggles that write while the load is running win over the rows it
    /// returns.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn load(&self) {
        let (session, epoch) = {
            let mut slot = self.slot();
            let Some(session) = slot.session.clone() else {
                return;
            };
            slot.loads += 1;
            self.phase.send_replace(SyncPhase::Loading);
            (session, slot.epoch)
        };
        let query = Query::table(BOOKMARK_TABLE)
            .eq("user_id", session.user.as_str())
            .not_null(self.kind.bookmark_column());
        let result = self.store.query(&query).await.or_raise(|| ErrorKind::Store);

        let mut slot = self.slot();
        if slot.epoch != epoch {
            tracing::debug!("discarding bookmark load for a previous session");
            return;
        }
        slot.loads = slot.loads.saturating_sub(1);
        let journal = if slot.loads == 0 { std::mem::take(&mut slot.journal) } else { slot.journal.clone() };
        match result {
            Ok(rows) => {
                let mut set: BookmarkSet = rows.iter().filter_map(|row| Bookmark::from_record(self.kind, row)).collect();
                if !journal.is_empty() {
                    tracing::debug!(entries = journal.len(), "replaying toggles made during load");
                }
                for (item, entry) in journal {
                    match entry {
                        Some(bookmark) => set.insert(bookmark),
                        None => set.remove(item),
                    };
                }
                tracing::info!(count = set.len(), "bookmarks loaded");
                self.set.send_replace(set);
                self.phase.send_replace(SyncPhase::Ready);
            },
            Err(err) => {
                tracing::error!(error = ?err, "failed to load bookmarks");
                self.phase.send_replace(SyncPhase::Failed);
            },
        }
    }

    pub fn is_bookmarked(&self, item: ItemId) -> bool {
        self.set.borrow().contains(item)
    }

    pub fn snapshot(&self) -> BookmarkSet {
        self.set.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BookmarkSet> {
        self.set.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Resolves once the set is no longer loading.
    pub async fn wait_ready(&self) {
        let mut phase = self.phase.subscribe();
        // The sender lives as long as `self`, so this can't fail.
        _ = phase.wait_for(|phase| phase.is_settled()).await;
    }

    pub(crate) fn membership(&self) -> Membership {
        if self.slot().session.is_none() {
            return Membership::SignedOut;
        }
        match self.phase() {
            SyncPhase::Loading => Membership::Loading,
            SyncPhase::Idle | SyncPhase::Ready | SyncPhase::Failed => Membership::Loaded(self.set.borrow().ids()),
        }
    }

    /// Add or remove the bookmark for `item`, optimistically. While the set
    /// is loading, waits for it first: which way to toggle depends on it.
    #[instrument(skip(self, item), fields(kind = %self.kind, item = %item.id))]
    pub async fn toggle(&self, item: &ListableItem) -> ToggleOutcome {
        if self.slot().session.is_none() {
            self.notifier.notify(Notification::auth_required());
            return ToggleOutcome::AuthRequired;
        }
        let Some(_pending) = Pending::acquire(&self.pending, item.id) else {
            tracing::debug!("toggle already in progress");
            return ToggleOutcome::Busy;
        };
        self.wait_ready().await;
        let (session, epoch) = {
            let slot = self.slot();
            (slot.session.clone(), slot.epoch)
        };
        let Some(session) = session else {
            self.notifier.notify(Notification::auth_required());
            return ToggleOutcome::AuthRequired;
        };
        let user = session.user.as_str();
        let column = self.kind.bookmark_column();
        let outcome = if self.is_bookmarked(item.id) {
            let conditions = [
                Condition::Eq { field: "user_id".to_string(), value: user.into() },
                Condition::Eq { field: column.to_string(), value: item.id.0.into() },
            ];
            let remote = async {
                self.store.delete(BOOKMARK_TABLE, &conditions).await.or_raise(|| ErrorKind::Store)?;
                Ok::<_, Error>(None)
            };
            self.transact(item.id, epoch, None, remote).await.map(|_| ToggleOutcome::Removed)
        } else {
            let created_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
            let mut record = Record::new();
            record.insert("user_id".to_string(), user.into());
            record.insert(column.to_string(), item.id.0.into());
            if let Some(created_at) = &created_at {
                record.insert("created_at".to_string(), created_at.as_str().into());
            }
            let tentative = Bookmark { id: None, item: item.id, created_at };
            let remote = async {
                let row = self.store.insert(BOOKMARK_TABLE, record).await.or_raise(|| ErrorKind::Store)?;
                let confirmed = Bookmark::from_record(self.kind, &row).ok_or_raise(|| ErrorKind::MalformedRecord(BOOKMARK_TABLE))?;
                Ok::<_, Error>(Some(confirmed))
            };
            self.transact(item.id, epoch, Some(tentative), remote).await.map(|_| ToggleOutcome::Added)
        };
        match outcome {
            Ok(ToggleOutcome::Added) => {
                tracing::info!("bookmark added");
                self.notifier.notify(Notification::added(&item.name));
                ToggleOutcome::Added
            },
            Ok(outcome) => {
                tracing::info!("bookmark removed");
                self.notifier.notify(Notification::removed(&item.name));
                outcome
            },
            Err(err) => {
                tracing::error!(error = ?err, "failed to update bookmark");
                self.notifier.notify(Notification::failed());
                ToggleOutcome::Failed
            },
        }
    }

    /// Apply `tentative` for `item`, run the remote commit, then apply what
    /// the store confirmed, or put the snapshot back if it failed. Writes are
    /// skipped once the session has changed underneath.
    async fn transact<F>(&self, item: ItemId, epoch: u64, tentative: Option<Bookmark>, remote: F) -> Result<Option<Bookmark>>
    where
        F: Future<Output = Result<Option<Bookmark>>>,
    {
        let snapshot = self.write(epoch, item, tentative, Journal::Record).flatten();
        match remote.await {
            Ok(confirmed) => {
                self.write(epoch, item, confirmed.clone(), Journal::Record);
                Ok(confirmed)
            },
            Err(err) => {
                // A load still running will bring back what the store holds.
                self.write(epoch, item, snapshot, Journal::Forget);
                Err(err)
            },
        }
    }

    /// Replace the entry for `item` if the session is still the one `epoch`
    /// was taken from, returning what was there before.
    fn write(&self, epoch: u64, item: ItemId, entry: Option<Bookmark>, journal: Journal) -> Option<Option<Bookmark>> {
        let mut slot = self.slot();
        if slot.epoch != epoch {
            return None;
        }
        match journal {
            Journal::Record if slot.loads > 0 => {
                slot.journal.insert(item, entry.clone());
            },
            Journal::Record => {},
            Journal::Forget => {
                slot.journal.remove(&item);
            },
        }
        Some(self.apply(item, entry))
    }

    /// Replace the entry for `item`, returning what was there before.
    fn apply(&self, item: ItemId, entry: Option<Bookmark>) -> Option<Bookmark> {
        let mut previous = None;
        self.set.send_modify(|set| {
            previous = match entry {
                Some(bookmark) => set.insert(bookmark),
                None => set.remove(item),
            };
        });
        previous
    }

    fn slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
enum Journal {
    Record,
    Forget,
}

/// Marks an item as having a toggle outstanding until dropped.
struct Pending<'a> {
    set: &'a Mutex<HashSet<ItemId>>,
    item: ItemId,
}

impl<'a> Pending<'a> {
    fn acquire(set: &'a Mutex<HashSet<ItemId>>, item: ItemId) -> Option<Self> {
        // The lock has to be released before a guard exists: dropping one
        // locks the set again.
        let inserted = set.lock().unwrap_or_else(PoisonError::into_inner).insert(item);
        inserted.then(|| Self { set, item })
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.item);
    }
}
