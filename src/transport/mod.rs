//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It defines the JSON protocol spoken with clients, the per-connection
//! `Session` that maps protocol messages onto the notification service, and
//! the server loop itself.

pub mod message;
pub mod session;
pub mod websocket;

#[cfg(test)]
mod tests;
