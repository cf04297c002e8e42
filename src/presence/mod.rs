//! Writer presence
//!
//! Tracks which users are currently writing a reply in which forum thread.
//!
//! - `store`: the shared per-thread map of writer entries with lazy expiry
//! - `tracker`: turns raw writing signals into "the writer list changed"
//!   decisions
//! - `model`: identifiers, entries and snapshots
//! - `clock`: the time source, injectable so expiry can be tested

pub mod clock;
pub mod model;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{ThreadId, UserRef, WriterEntry, WriterListSnapshot};
pub use store::PresenceStore;
pub use tracker::PresenceTracker;
