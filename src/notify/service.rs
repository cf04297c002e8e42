use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::presence::{PresenceTracker, ThreadId, UserRef, WriterListSnapshot};
use crate::registry::{Channel, SubscriptionHandle, SubscriptionRegistry};
use crate::transport::message::ServerMessage;

#[derive(Debug, Default)]
pub struct NotificationService {
    tracker: PresenceTracker,
    registry: SubscriptionRegistry,
    /// Live connections per (thread, user id) that have signalled writing.
    writer_connections: Mutex<HashMap<(ThreadId, String), usize>>,
}

impl NotificationService {
    pub fn new(tracker: PresenceTracker, registry: SubscriptionRegistry) -> Self {
        Self {
            tracker,
            registry,
            writer_connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// `user` is writing in `thread`; broadcast if the writer list changed.
    pub fn handle_writing_signal(&self, thread: ThreadId, user: &UserRef) {
        if let Some(snapshot) = self.tracker.on_writing_signal(thread, user) {
            self.publish(&snapshot);
        }
    }

    /// `user` stopped writing in `thread`; broadcast if that changed the list.
    pub fn handle_writing_stopped(&self, thread: ThreadId, user: &UserRef) {
        if let Some(snapshot) = self.tracker.on_writing_stopped(thread, user) {
            self.publish(&snapshot);
        }
    }

    /// Count one more connection of `user` writing in `thread`.
    pub fn retain_writer(&self, thread: ThreadId, user: &UserRef) {
        let mut conns = self
            .writer_connections
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *conns.entry((thread, user.id.clone())).or_insert(0) += 1;
    }

    /// Release one connection of `user` writing in `thread`. Returns true
    /// when it was the last one, i.e. the user's writing session in that
    /// thread has ended.
    pub fn release_writer(&self, thread: ThreadId, user: &UserRef) -> bool {
        let mut conns = self
            .writer_connections
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let key = (thread, user.id.clone());
        match conns.get_mut(&key) {
            Some(n) if *n > 1 => {
                *n -= 1;
                false
            }
            Some(_) => {
                conns.remove(&key);
                true
            }
            None => true,
        }
    }

    /// Start pushing writer lists of `thread` to `channel`. The channel
    /// immediately receives the current list. Expiries noticed on the way
    /// are broadcast to every viewer of the thread, the new one included.
    pub fn subscribe(&self, thread: ThreadId, channel: &Arc<dyn Channel>) -> SubscriptionHandle {
        let handle = self.registry.subscribe(thread, channel);

        let refreshed = self.tracker.refresh(thread);
        if refreshed.changed {
            self.publish(&refreshed.snapshot);
        } else if let Some(payload) = encode(&refreshed.snapshot) {
            if let Err(e) = channel.send(&payload) {
                debug!(%thread, "initial writer list not delivered: {e}");
                self.registry.unsubscribe(&handle);
            }
        }
        handle
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.registry.unsubscribe(handle);
    }

    /// Prune expired writers everywhere and broadcast the threads that
    /// changed. Returns how many threads were broadcast.
    pub fn sweep_expired(&self) -> usize {
        let changed = self.tracker.sweep_expired();
        for snapshot in &changed {
            self.publish(snapshot);
        }
        changed.len()
    }

    /// Periodically sweep expired writers so viewers see them disappear
    /// without waiting for the next signal in the thread.
    pub async fn start_sweep_loop(service: Arc<NotificationService>, every: Duration) {
        info!("Writer sweep running every {:?}", every);
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let swept = service.sweep_expired();
            if swept > 0 {
                debug!(threads = swept, "swept expired writers");
            }
        }
    }

    fn publish(&self, snapshot: &WriterListSnapshot) {
        let Some(payload) = encode(snapshot) else {
            return;
        };
        let delivered = self.registry.broadcast(snapshot.thread, &payload);
        debug!(
            thread = %snapshot.thread,
            version = snapshot.version,
            writers = snapshot.len(),
            delivered,
            "writer list broadcast"
        );
    }
}

fn encode(snapshot: &WriterListSnapshot) -> Option<String> {
    match serde_json::to_string(&ServerMessage::from(snapshot)) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize writer list: {e}");
            None
        }
    }
}
