//! Chat wire format.
//!
//! ```text
//! client → server   {"room_id": "r1", "displayName": "ada"}     (first frame)
//!                   {"message": "hello"}                         (afterwards)
//! server → client   {"type": "user_joined", "room_id", "displayName", "timestamp"}
//!                   {"type": "new_message", "room_id", "displayName", "message", "timestamp"}
//!                   {"type": "user_left",   "room_id", "displayName", "timestamp"}
//!                   {"type": "error", "message"}
//! ```

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// First frame a chat client sends.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct JoinRequest {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

/// Every frame after the join.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatInput {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatInput {
    /// The message text, if there is any worth relaying.
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

/// Events the server sends to chat clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    UserJoined {
        room_id: String,
        #[serde(rename = "displayName")]
        display_name: String,
        timestamp: u64,
    },
    NewMessage {
        room_id: String,
        #[serde(rename = "displayName")]
        display_name: String,
        message: String,
        timestamp: u64,
    },
    UserLeft {
        room_id: String,
        #[serde(rename = "displayName")]
        display_name: String,
        timestamp: u64,
    },
    Error {
        message: String,
    },
}

impl ChatEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Encode as a text frame.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// Current Unix time in whole seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
