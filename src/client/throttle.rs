use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::presence::ThreadId;

/// Limits writing signals to one per `interval` per thread.
///
/// Keystrokes are far more frequent than the server needs to hear about;
/// one signal every few seconds keeps a writer alive well inside the
/// server-side TTL.
#[derive(Debug, Clone)]
pub struct SignalThrottle {
    interval: Duration,
    last_sent: HashMap<ThreadId, Instant>,
}

impl SignalThrottle {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: HashMap::new(),
        }
    }

    /// Returns true, and records `now`, if a signal for `thread` may go out.
    pub fn should_send(&mut self, thread: ThreadId, now: Instant) -> bool {
        match self.last_sent.get(&thread) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                self.last_sent.insert(thread, now);
                true
            }
        }
    }

    /// Forget `thread`, e.g. after the reply was posted.
    pub fn reset(&mut self, thread: ThreadId) {
        self.last_sent.remove(&thread);
    }
}

impl Default for SignalThrottle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
