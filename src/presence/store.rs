//! Presence store
//!
//! Holds the writer entries of every thread behind one coarse mutex. Contention
//! is low (one short critical section per signal) so a single lock keeps the
//! per-thread operations trivially linearizable.
//!
//! Expiry is lazy: entries are pruned for the touched thread on every write
//! and every read, never by a global scan (the optional sweeper in
//! `notify` is the one exception and walks only threads that have entries).
//!
//! Every change to a thread's writer set stamps the thread with a new value of
//! a store-wide sequence. A thread also remembers the last stamp that was
//! announced to subscribers, which lets the tracker notice changes made by a
//! plain read-side prune.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::presence::model::{ThreadId, UserRef, WriterEntry, WriterListSnapshot};

#[derive(Debug, Default)]
struct ThreadBucket {
    entries: HashMap<String, WriterEntry>,
    version: u64,
    announced: u64,
    /// Number of writers in the last announced list.
    announced_len: usize,
}

impl ThreadBucket {
    fn writers(&self) -> BTreeSet<UserRef> {
        self.entries.values().map(|e| e.user.clone()).collect()
    }

    fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> Vec<UserRef> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now, ttl))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|e| e.user)
            .collect()
    }

    /// No writers left, and nobody was told about any: an unannounced
    /// change from or back to an empty list has nothing left to report.
    fn is_disposable(&self) -> bool {
        self.entries.is_empty() && (self.version == self.announced || self.announced_len == 0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    threads: HashMap<ThreadId, ThreadBucket>,
    seq: u64,
}

impl Inner {
    /// Run `op` on the bucket of `thread` and stamp a new version if the
    /// writer set changed. Empty, fully announced buckets are dropped.
    fn with_bucket<R>(
        &mut self,
        thread: ThreadId,
        op: impl FnOnce(&mut ThreadBucket) -> R,
    ) -> R {
        let Inner { threads, seq } = self;
        let bucket = threads.entry(thread).or_default();

        let before = bucket.writers();
        let result = op(bucket);
        if bucket.writers() != before {
            *seq += 1;
            bucket.version = *seq;
        }

        if bucket.is_disposable() {
            threads.remove(&thread);
        }
        result
    }
}

/// Outcome of [`PresenceStore::transition`].
#[derive(Debug, Clone)]
pub struct Transition {
    /// The current writers after the operation.
    pub snapshot: WriterListSnapshot,
    /// True when the writer set differs from the last announced one.
    pub changed: bool,
}

#[derive(Debug)]
pub struct PresenceStore {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl PresenceStore {
    /// Time without a signal after which a writer is dropped.
    pub const DEFAULT_TTL_SECS: i64 = 30;

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // every critical section leaves the map consistent, so a poisoned
        // lock is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or refresh the entry for `user` in `thread`.
    pub fn record_activity(&self, thread: ThreadId, user: &UserRef, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.lock().with_bucket(thread, |bucket| {
            bucket.prune(now, ttl);
            upsert(&mut bucket.entries, user, now);
        });
    }

    /// Remove and return every writer of `thread` idle for at least the TTL.
    pub fn prune_expired(&self, thread: ThreadId, now: DateTime<Utc>) -> BTreeSet<UserRef> {
        let ttl = self.ttl;
        let mut inner = self.lock();
        if !inner.threads.contains_key(&thread) {
            return BTreeSet::new();
        }
        let removed = inner.with_bucket(thread, |bucket| bucket.prune(now, ttl));
        if !removed.is_empty() {
            trace!(%thread, count = removed.len(), "pruned expired writers");
        }
        removed.into_iter().collect()
    }

    /// Non-expired writers of `thread`, pruning first.
    pub fn current_writers(&self, thread: ThreadId, now: DateTime<Utc>) -> BTreeSet<UserRef> {
        self.snapshot(thread, now).writers
    }

    /// Like [`current_writers`](Self::current_writers) but with the thread's
    /// version attached.
    pub fn snapshot(&self, thread: ThreadId, now: DateTime<Utc>) -> WriterListSnapshot {
        let ttl = self.ttl;
        let mut inner = self.lock();
        if !inner.threads.contains_key(&thread) {
            return empty_snapshot(thread);
        }
        inner.with_bucket(thread, |bucket| {
            bucket.prune(now, ttl);
        });
        inner
            .threads
            .get(&thread)
            .map(|bucket| snapshot_of(thread, bucket))
            .unwrap_or_else(|| empty_snapshot(thread))
    }

    /// Drop `user` from `thread`. Returns whether an entry was present.
    pub fn remove_user(&self, thread: ThreadId, user: &UserRef) -> bool {
        let mut inner = self.lock();
        if !inner.threads.contains_key(&thread) {
            return false;
        }
        inner.with_bucket(thread, |bucket| bucket.entries.remove(&user.id).is_some())
    }

    /// Prune `thread`, apply `op` to its entries, and report whether the
    /// writer set now differs from the last announced one. When it does, the
    /// new state is marked as announced.
    ///
    /// Pruning, the operation and the comparison all happen under one lock
    /// acquisition, so concurrent signals for the same thread cannot both
    /// claim the same change.
    pub fn transition(
        &self,
        thread: ThreadId,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut HashMap<String, WriterEntry>),
    ) -> Transition {
        let ttl = self.ttl;
        let mut inner = self.lock();
        let Inner { threads, seq } = &mut *inner;
        let bucket = threads.entry(thread).or_default();

        let before = bucket.writers();
        bucket.prune(now, ttl);
        op(&mut bucket.entries);
        if bucket.writers() != before {
            *seq += 1;
            bucket.version = *seq;
        }

        let changed = bucket.version != bucket.announced;
        bucket.announced = bucket.version;
        bucket.announced_len = bucket.entries.len();
        let snapshot = snapshot_of(thread, bucket);

        if bucket.is_disposable() {
            threads.remove(&thread);
        }
        Transition { snapshot, changed }
    }

    /// Threads that currently hold at least one entry or an unannounced
    /// change.
    pub fn active_threads(&self) -> Vec<ThreadId> {
        self.lock().threads.keys().copied().collect()
    }

    /// Prune every active thread and return snapshots for those whose writer
    /// set changed since it was last announced.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<WriterListSnapshot> {
        let mut changed = Vec::new();
        for thread in self.active_threads() {
            let t = self.transition(thread, now, |_| {});
            if t.changed {
                changed.push(t.snapshot);
            }
        }
        changed
    }

    pub fn thread_count(&self) -> usize {
        self.lock().threads.len()
    }
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new(Duration::seconds(Self::DEFAULT_TTL_SECS))
    }
}

/// Insert `user` or refresh its timestamp in place.
pub fn upsert(entries: &mut HashMap<String, WriterEntry>, user: &UserRef, now: DateTime<Utc>) {
    entries
        .entry(user.id.clone())
        .and_modify(|e| {
            e.last_active = now;
            e.user = user.clone();
        })
        .or_insert_with(|| WriterEntry::new(user.clone(), now));
}

fn snapshot_of(thread: ThreadId, bucket: &ThreadBucket) -> WriterListSnapshot {
    WriterListSnapshot {
        thread,
        version: bucket.version,
        writers: bucket.writers(),
    }
}

fn empty_snapshot(thread: ThreadId) -> WriterListSnapshot {
    WriterListSnapshot {
        thread,
        version: 0,
        writers: BTreeSet::new(),
    }
}
