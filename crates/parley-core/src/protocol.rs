//! WebSocket wire protocol shared by the relay and the client controller.
//!
//! Every frame is a JSON text frame tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Error text sent back when an inbound frame is not valid JSON.
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid message format";

/// Client -> server event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Chat {
        session_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl ClientEvent {
    /// Extract a chat event from an already parsed frame.
    ///
    /// Returns `None` when the frame is not a chat event or when `sessionId`
    /// or `content` is missing, empty or not a string. Such frames are
    /// dropped without a reply.
    pub fn from_frame(frame: &serde_json::Value) -> Option<Self> {
        if frame.get("type").and_then(|t| t.as_str()) != Some("chat") {
            return None;
        }
        let session_id = frame
            .get("sessionId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())?;
        let content = frame
            .get("content")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())?;
        let metadata = frame.get("metadata").filter(|m| !m.is_null()).cloned();

        Some(ClientEvent::Chat {
            session_id: session_id.to_string(),
            content: content.to_string(),
            metadata,
        })
    }
}

/// Server -> client event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A stored message, broadcast to every open connection.
    Message { message: Message },
    /// Sent only to the connection whose frame could not be parsed.
    Error { message: String },
}

impl ServerEvent {
    pub fn invalid_format() -> Self {
        ServerEvent::Error {
            message: INVALID_FORMAT_MESSAGE.to_string(),
        }
    }
}
