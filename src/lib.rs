//! # quillcast
//!
//! `quillcast` powers a "who's writing" indicator for forum threads. Clients
//! signal while their user types a reply; everyone viewing the thread gets
//! the current list of writers pushed to them over a WebSocket.
//!
//! ## Core Modules
//!
//! - `presence`: per-thread writer entries with a 30 second expiry, and the
//!   tracker that decides when the writer list changed.
//! - `registry`: live push channels per thread, with fan-out broadcast.
//! - `notify`: glues the two together; the only path that triggers a broadcast.
//! - `client`: a connected client and the client-side signal throttle.
//! - `config`: loading server configuration.
//! - `transport`: the WebSocket protocol and server.
//! - `utils`: error types and logging.

pub mod client;
pub mod config;
pub mod notify;
pub mod presence;
pub mod registry;
pub mod transport;
pub mod utils;
