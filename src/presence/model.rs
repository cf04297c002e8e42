//! Presence data types
//!
//! - `ThreadId`: forum thread identifier, serialized as a bare number
//! - `UserRef`: user id plus display name; only the name goes on the wire
//! - `WriterEntry`: one user's last writing activity in one thread
//! - `WriterListSnapshot`: the writers of a thread at a point in time. It is
//!   always computed from live entries, never stored.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

impl From<u64> for ThreadId {
    fn from(id: u64) -> Self {
        ThreadId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Ids and names must be non-blank. Checked at the transport boundary.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct WriterEntry {
    pub user: UserRef,
    pub last_active: DateTime<Utc>,
}

impl WriterEntry {
    pub fn new(user: UserRef, now: DateTime<Utc>) -> Self {
        Self {
            user,
            last_active: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_active >= ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterListSnapshot {
    pub thread: ThreadId,
    /// Bumped every time the writer set of `thread` changes.
    pub version: u64,
    pub writers: BTreeSet<UserRef>,
}

impl WriterListSnapshot {
    /// Display names in `(id, name)` order.
    pub fn names(&self) -> Vec<String> {
        self.writers.iter().map(|u| u.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}
