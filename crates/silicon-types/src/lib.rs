//! Shared types and constants for the Silicon relay, agents and frontends.
//!
//! This crate defines the wire protocol spoken over the relay's WebSocket
//! endpoints, the event vocabulary exchanged between agents and frontends,
//! the voice profile types consumed by the synthesis layer, and the logging
//! settings both binaries share. It stays free of the async stack so every
//! other crate in the workspace can depend on it.

pub mod event;
pub mod logging;
pub mod protocol;
pub mod voice;

pub use event::AgentEvent;
pub use logging::LoggingConfig;
pub use protocol::{
    parse_incoming, IncomingMessage, OutgoingMessage, ProtocolError, RelayedEnvelope,
};

use serde::{Deserialize, Serialize};

/// Close code sent when an agent connects under a name that is already online.
pub const AGENT_NAME_TAKEN_CLOSE_CODE: u16 = 4001;

/// Close reason paired with [`AGENT_NAME_TAKEN_CLOSE_CODE`].
pub const AGENT_NAME_TAKEN_REASON: &str = "Agent name already connected";

/// Reserved event type driving agent polling loops. Never dispatched to
/// event handlers.
pub const LOOP_EVENT_TYPE: &str = "loop";

/// The side of the relay a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// An agent process representing one named persona.
    Agent,
    /// A viewer subscribed to one agent name.
    Frontend,
}

impl Role {
    /// Returns the role on the other side of the relay.
    pub fn opposite(self) -> Self {
        match self {
            Self::Agent => Self::Frontend,
            Self::Frontend => Self::Agent,
        }
    }

    /// Returns the string label for this role.
    pub fn label(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Frontend => "frontend",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
