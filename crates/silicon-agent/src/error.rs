//! Error types for the agent runtime.

use tokio_tungstenite::tungstenite;

/// Errors that end an agent run or an outbound call.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The WebSocket connection failed.
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// The relay closed the connection with a rejection code, e.g. because
    /// another agent already holds the name.
    #[error("relay rejected agent {name}: {reason} (code {code})")]
    Rejected {
        name: String,
        code: u16,
        reason: String,
    },

    /// An outbound event could not be encoded.
    #[error("failed to encode event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The connection has ended; nothing more can be sent.
    #[error("agent connection is closed")]
    Closed,

    /// No agent type is registered under this name.
    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error(transparent)]
    Bot(#[from] silicon_bot::BotError),

    #[error(transparent)]
    Voice(#[from] silicon_voice::VoiceError),
}
