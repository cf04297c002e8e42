use serde::{Deserialize, Serialize};

use crate::presence::{ThreadId, WriterListSnapshot};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "identify")]
    Identify { user_id: String, name: String },

    #[serde(rename = "view")]
    View { thread: ThreadId },

    #[serde(rename = "leave")]
    Leave { thread: ThreadId },

    #[serde(rename = "writing")]
    Writing { thread: ThreadId },

    #[serde(rename = "stopped")]
    Stopped { thread: ThreadId },
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "identified")]
    Identified {},

    #[serde(rename = "writers")]
    Writers {
        thread: ThreadId,
        version: u64,
        writers: Vec<String>,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

impl From<&WriterListSnapshot> for ServerMessage {
    fn from(snapshot: &WriterListSnapshot) -> Self {
        ServerMessage::Writers {
            thread: snapshot.thread,
            version: snapshot.version,
            writers: snapshot.names(),
        }
    }
}
