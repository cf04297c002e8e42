use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::registry::Channel;
use crate::utils::error::ChannelError;

/// A connected WebSocket client.
///
/// Sending only enqueues onto an unbounded channel drained by the
/// connection's writer task, so a slow socket never blocks a broadcast.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: String,

    /// Queue of frames for the connection's writer task.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", uuid::Uuid::new_v4()),
            sender,
        }
    }
}

impl Channel for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, payload: &str) -> Result<(), ChannelError> {
        self.sender
            .send(WsMessage::text(payload))
            .map_err(|_| ChannelError::Closed(self.id.clone()))
    }
}
