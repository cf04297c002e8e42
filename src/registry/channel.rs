use crate::utils::error::ChannelError;

/// A server-to-client push connection.
///
/// Channels are owned by the transport; the registry only keeps weak
/// references, so dropping the last strong reference is enough to make a
/// channel unreachable for broadcasts.
pub trait Channel: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Queue `payload` for delivery. Must not block on the network.
    fn send(&self, payload: &str) -> Result<(), ChannelError>;
}
