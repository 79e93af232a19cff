//! Event payloads carried inside routed envelopes.

use serde::{Deserialize, Serialize};

/// The event vocabulary spoken between agents and frontends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A sentence the agent speaks, with its base64-encoded audio.
    SayAloud { content: String, media_data: String },
    /// A bracketed control tag from the model output (e.g. an expression cue).
    BracketTag { content: String },
    /// Text typed by a viewer.
    UserInput { content: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn say_aloud_wire_shape() {
        let event = AgentEvent::SayAloud {
            content: "Hello.".to_string(),
            media_data: "UklGRg==".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "say_aloud", "content": "Hello.", "media_data": "UklGRg=="})
        );
    }

    #[test]
    fn user_input_decodes_from_frontend_payload() {
        let event: AgentEvent =
            serde_json::from_value(json!({"type": "user_input", "content": "hi"})).unwrap();
        assert_eq!(event, AgentEvent::UserInput { content: "hi".to_string() });
    }
}
