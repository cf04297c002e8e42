use tracing::warn;
use tungstenite::protocol::Message as WsMessage;

use crate::transport::message::ServerMessage;

/// What a frame from the server means to the demo client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Identified,
    Writers(Vec<String>),
    ServerError(String),
    /// Control frames, stale writer lists and unreadable text.
    Ignored,
    Closed,
}

/// Decodes server frames and keeps only the newest writer list.
#[derive(Debug, Default)]
pub struct WriterUpdates {
    last_version: u64,
}

impl WriterUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_frame(&mut self, frame: WsMessage) -> ClientEvent {
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return ClientEvent::Closed,
            _ => return ClientEvent::Ignored,
        };

        match serde_json::from_str::<ServerMessage>(text.as_str()) {
            Ok(ServerMessage::Writers {
                version, writers, ..
            }) => {
                // updates may arrive out of order; keep the newest
                if version < self.last_version {
                    return ClientEvent::Ignored;
                }
                self.last_version = version;
                ClientEvent::Writers(writers)
            }
            Ok(ServerMessage::Error { message }) => ClientEvent::ServerError(message),
            Ok(ServerMessage::Identified {}) => ClientEvent::Identified,
            Err(e) => {
                warn!("Unreadable server message: {e}");
                ClientEvent::Ignored
            }
        }
    }
}
