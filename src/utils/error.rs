//! The `error` module defines the error types used within `quillcast`.
//!
//! Presence bookkeeping itself has no failure modes (a missing entry is a
//! normal state), so the errors here only cover delivery to clients and the
//! network transport.

use thiserror::Error;

/// Failure to push a payload to a client channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The receiving side of the channel has gone away.
    #[error("channel {0} is closed")]
    Closed(String),
}

/// Errors raised while running the WebSocket server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
