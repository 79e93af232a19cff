//! Frames exchanged on the relay's WebSocket endpoints.
//!
//! Agents and frontends send [`IncomingMessage`] frames. The relay answers the
//! sender directly with [`OutgoingMessage`] frames and delivers routed events
//! to the other side wrapped in a [`RelayedEnvelope`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by an agent or a frontend to the relay.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// An event to route to every session of the opposite role under the
    /// sender's name.
    Event {
        #[serde(default)]
        data: Value,
    },
    /// The sender is leaving; its session is removed immediately.
    Disconnect,
    /// Frontend query: is an agent currently connected under my name?
    IsAgentOnline,
}

impl IncomingMessage {
    /// Returns the wire tag of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::Disconnect => "disconnect",
            Self::IsAgentOnline => "is_agent_online",
        }
    }
}

/// Frames the relay sends back to the session that caused them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Welcome frame sent once after a session is accepted.
    System {
        message: String,
        client_id: String,
        timestamp: String,
    },
    /// Acknowledgement or query answer.
    Success { message: Value },
    /// Error reported only to the offending sender.
    Error { message: String },
}

impl OutgoingMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<Value>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }
}

/// A routed event as delivered to its recipients.
///
/// `time` is stamped by the relay at routing time (RFC 3339), never by the
/// sender.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RelayedEnvelope {
    pub time: String,
    pub data: Value,
}

/// Reasons an inbound frame cannot be handled.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame has no `type` or an empty one.
    #[error("empty message type")]
    EmptyType,

    /// The frame's `type` is not one the relay understands.
    #[error("unsupported message type: {0}")]
    UnsupportedType(String),
}

/// Decodes an inbound text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for undecodable text,
/// [`ProtocolError::EmptyType`] when `type` is missing or empty, and
/// [`ProtocolError::UnsupportedType`] for any other tag.
pub fn parse_incoming(text: &str) -> Result<IncomingMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if kind.is_empty() {
        return Err(ProtocolError::EmptyType);
    }
    serde_json::from_value(value).map_err(|_| ProtocolError::UnsupportedType(kind))
}
