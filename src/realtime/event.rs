//! Realtime wire events.
//!
//! Every text frame is `{"event": "<name>", "data": {...}}` with camelCase
//! payloads. Server events this client does not know are skipped rather
//! than treated as errors, so the backend can add events freely.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::types::Message;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("invalid payload for {event}: {message}")]
    Payload { event: String, message: String },
}

/// Raw frame shape shared by both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Snapshot of everyone online, sent after connecting.
    PresenceList { user_ids: Vec<String> },
    UserOnline { user_id: String },
    UserOffline { user_id: String },
    MessageNew(Message),
    /// `message_ids` empty means every message from the other side.
    MessageRead { conversation_id: String, reader_id: String, message_ids: Vec<String> },
    TypingStart { conversation_id: String, user_id: String },
    TypingStop { conversation_id: String, user_id: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceListData {
    #[serde(default)]
    user_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadData {
    conversation_id: String,
    #[serde(default)]
    reader_id: String,
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingData {
    conversation_id: String,
    #[serde(default)]
    user_id: String,
}

impl RealtimeEvent {
    /// Decode a text frame. `Ok(None)` for events this client ignores.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the frame is not JSON or a known event
    /// carries a payload of the wrong shape.
    pub fn decode(text: &str) -> Result<Option<Self>, CodecError> {
        let wire: WireEvent = serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))?;
        let event = match wire.event.as_str() {
            "presence:list" => {
                let d: PresenceListData = payload(&wire)?;
                Self::PresenceList { user_ids: d.user_ids }
            }
            "presence:online" => Self::UserOnline { user_id: payload::<UserData>(&wire)?.user_id },
            "presence:offline" => Self::UserOffline { user_id: payload::<UserData>(&wire)?.user_id },
            "message:new" => Self::MessageNew(payload(&wire)?),
            "message:read" => {
                let d: ReadData = payload(&wire)?;
                Self::MessageRead { conversation_id: d.conversation_id, reader_id: d.reader_id, message_ids: d.message_ids }
            }
            "typing:start" => {
                let d: TypingData = payload(&wire)?;
                Self::TypingStart { conversation_id: d.conversation_id, user_id: d.user_id }
            }
            "typing:stop" => {
                let d: TypingData = payload(&wire)?;
                Self::TypingStop { conversation_id: d.conversation_id, user_id: d.user_id }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn payload<T: DeserializeOwned>(wire: &WireEvent) -> Result<T, CodecError> {
    serde_json::from_value(wire.data.clone())
        .map_err(|e| CodecError::Payload { event: wire.event.clone(), message: e.to_string() })
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinConversation { conversation_id: String },
    LeaveConversation { conversation_id: String },
    TypingStart { conversation_id: String },
    TypingStop { conversation_id: String },
    MarkRead { conversation_id: String },
}

impl ClientEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation { .. } => "conversation:join",
            Self::LeaveConversation { .. } => "conversation:leave",
            Self::TypingStart { .. } => "typing:start",
            Self::TypingStop { .. } => "typing:stop",
            Self::MarkRead { .. } => "message:read",
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::JoinConversation { conversation_id }
            | Self::LeaveConversation { conversation_id }
            | Self::TypingStart { conversation_id }
            | Self::TypingStop { conversation_id }
            | Self::MarkRead { conversation_id } => conversation_id,
        }
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] if serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        let data = serde_json::json!({ "conversationId": self.conversation_id() });
        let wire = WireEvent { event: self.name().to_owned(), data };
        serde_json::to_string(&wire).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
