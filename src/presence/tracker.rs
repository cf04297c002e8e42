//! Presence tracker
//!
//! Turns a raw "user is writing in thread T" signal into a decision: did the
//! broadcastable writer list of T change? Only changes produce a snapshot, so
//! a user re-signalling inside the TTL window costs no broadcast.
//!
//! Expired writers are noticed when the thread is next touched. The optional
//! sweep (`sweep_expired`) lets a background task notice them proactively.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::presence::clock::{Clock, SystemClock};
use crate::presence::model::{ThreadId, UserRef, WriterListSnapshot};
use crate::presence::store::{PresenceStore, Transition, upsert};

#[derive(Debug)]
pub struct PresenceTracker {
    store: PresenceStore,
    clock: Arc<dyn Clock>,
}

impl PresenceTracker {
    pub fn new(store: PresenceStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Tracker on the wall clock with the given writer TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(PresenceStore::new(ttl), Arc::new(SystemClock))
    }

    pub fn store(&self) -> &PresenceStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record that `user` is writing in `thread`. Returns the new writer list
    /// if it differs from the last one handed out for this thread.
    pub fn on_writing_signal(
        &self,
        thread: ThreadId,
        user: &UserRef,
    ) -> Option<WriterListSnapshot> {
        let now = self.now();
        let transition = self
            .store
            .transition(thread, now, |entries| upsert(entries, user, now));

        if transition.changed {
            debug!(%thread, user = %user, writers = transition.snapshot.len(), "writer list changed");
            Some(transition.snapshot)
        } else {
            None
        }
    }

    /// Drop `user` from `thread` (reply posted or session ended). Returns the
    /// new writer list if that changed it.
    pub fn on_writing_stopped(
        &self,
        thread: ThreadId,
        user: &UserRef,
    ) -> Option<WriterListSnapshot> {
        let transition = self.store.transition(thread, self.now(), |entries| {
            entries.remove(&user.id);
        });

        if transition.changed {
            debug!(%thread, user = %user, "writer stopped");
            Some(transition.snapshot)
        } else {
            None
        }
    }

    /// The current writer list, as sent to a client that just started
    /// viewing `thread`.
    pub fn snapshot(&self, thread: ThreadId) -> WriterListSnapshot {
        self.store.snapshot(thread, self.now())
    }

    /// Prune `thread` and mark the result as announced. `changed` is set
    /// when the pruned list differs from the one viewers last received.
    pub fn refresh(&self, thread: ThreadId) -> Transition {
        self.store.transition(thread, self.now(), |_| {})
    }

    /// Prune every active thread; returns the threads whose list shrank.
    pub fn sweep_expired(&self) -> Vec<WriterListSnapshot> {
        self.store.sweep(self.now())
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(PresenceStore::default(), Arc::new(SystemClock))
    }
}
