use serde::{Deserialize, Serialize};

use crate::api::models::Message;
use crate::error::StreamError;

/// A text frame pushed by the document store over the listen socket.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncomingEvent {
    /// Full ordered contents of the collection after a change.
    Snapshot { messages: Vec<Message> },
    Error { message: String },
}

impl IncomingEvent {
    pub fn parse(text: &str) -> Result<Self, StreamError> {
        serde_json::from_str(text).map_err(|e| StreamError::Protocol(e.to_string()))
    }

    /// Maps a frame onto what a subscriber sees: a snapshot or a subscription failure.
    pub fn into_delivery(self) -> Result<Vec<Message>, StreamError> {
        match self {
            IncomingEvent::Snapshot { messages } => Ok(messages),
            IncomingEvent::Error { message } => Err(StreamError::Subscription(message)),
        }
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;
