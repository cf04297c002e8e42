//! The `client` module defines the representation of a connected client.
//!
//! `Client` wraps the outbound queue of one WebSocket connection and is the
//! `Channel` the registry pushes writer lists into. `SignalThrottle` is the
//! client-side rate limit on writing signals, and `WriterUpdates` decodes
//! what the server pushes back; both are used by the demo client.

pub mod connection;
pub mod throttle;
pub mod updates;

pub use connection::Client;
pub use throttle::SignalThrottle;
pub use updates::{ClientEvent, WriterUpdates};
