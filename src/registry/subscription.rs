//! Subscription bookkeeping
//!
//! Subscribers are grouped per thread. `broadcast` copies the subscriber list
//! of the target thread while holding the lock, releases it, and only then
//! sends. Subscribing or unsubscribing while a broadcast is in flight is
//! therefore always safe, and every channel in the copy is tried exactly
//! once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::presence::ThreadId;
use crate::registry::channel::Channel;

/// Returned by [`SubscriptionRegistry::subscribe`]; pass it back to
/// [`SubscriptionRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    thread: ThreadId,
    id: Uuid,
}

impl SubscriptionHandle {
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

/// Channels viewing one thread.
#[derive(Default)]
struct ThreadSubscribers {
    subscribers: HashMap<Uuid, Weak<dyn Channel>>,
}

impl ThreadSubscribers {
    fn subscribe(&mut self, id: Uuid, channel: Weak<dyn Channel>) {
        self.subscribers.insert(id, channel);
    }

    fn unsubscribe(&mut self, id: &Uuid) -> bool {
        self.subscribers.remove(id).is_some()
    }
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    threads: Mutex<HashMap<ThreadId, ThreadSubscribers>>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("threads", &self.lock().len())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, ThreadSubscribers>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `channel` as a viewer of `thread`.
    pub fn subscribe(&self, thread: ThreadId, channel: &Arc<dyn Channel>) -> SubscriptionHandle {
        let handle = SubscriptionHandle {
            thread,
            id: Uuid::new_v4(),
        };
        self.lock()
            .entry(thread)
            .or_default()
            .subscribe(handle.id, Arc::downgrade(channel));

        debug!(%thread, channel = channel.id(), "subscribed");
        handle
    }

    /// Remove a subscription. Unknown or already removed handles are ignored.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut threads = self.lock();
        let Some(subs) = threads.get_mut(&handle.thread) else {
            return;
        };
        if subs.unsubscribe(&handle.id) {
            debug!(thread = %handle.thread, "unsubscribed");
        }
        if subs.subscribers.is_empty() {
            threads.remove(&handle.thread);
        }
    }

    /// Send `payload` to every channel viewing `thread`. Channels that fail or
    /// have been dropped by their owner are unsubscribed. Returns the number
    /// of successful sends.
    pub fn broadcast(&self, thread: ThreadId, payload: &str) -> usize {
        let targets: Vec<(Uuid, Weak<dyn Channel>)> = match self.lock().get(&thread) {
            Some(subs) => subs
                .subscribers
                .iter()
                .map(|(id, ch)| (*id, ch.clone()))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, channel) in targets {
            match channel.upgrade() {
                Some(channel) => match channel.send(payload) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(%thread, "dropping subscriber: {e}");
                        dead.push(id);
                    }
                },
                None => dead.push(id),
            }
        }

        for id in dead {
            self.unsubscribe(&SubscriptionHandle { thread, id });
        }

        delivered
    }

    pub fn subscriber_count(&self, thread: ThreadId) -> usize {
        self.lock()
            .get(&thread)
            .map_or(0, |subs| subs.subscribers.len())
    }

    pub fn thread_count(&self) -> usize {
        self.lock().len()
    }
}
