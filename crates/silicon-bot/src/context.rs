use serde::{Deserialize, Serialize};

/// Author of a context turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Selects the turns sent to the model: the last `max_turns` messages,
/// preceded by the system prompt when one is set.
pub fn context_window(
    messages: &[ChatMessage],
    max_turns: usize,
    system_prompt: Option<&str>,
) -> Vec<ChatMessage> {
    let start = messages.len().saturating_sub(max_turns);
    let mut window = Vec::with_capacity(messages.len() - start + 1);
    if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
        window.push(ChatMessage::new(ChatRole::System, prompt));
    }
    window.extend_from_slice(&messages[start..]);
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| ChatMessage::new(ChatRole::User, format!("m{i}")))
            .collect()
    }

    #[test]
    fn window_keeps_only_latest_turns() {
        let window = context_window(&turns(15), 11, None);
        assert_eq!(window.len(), 11);
        assert_eq!(window[0].content, "m4");
        assert_eq!(window[10].content, "m14");
    }

    #[test]
    fn window_prepends_system_prompt() {
        let window = context_window(&turns(2), 11, Some("You are a mascot."));
        assert_eq!(window.len(), 3);
        assert_eq!(window[0], ChatMessage::new(ChatRole::System, "You are a mascot."));
        assert_eq!(window[2].content, "m1");
    }

    #[test]
    fn empty_system_prompt_is_skipped() {
        assert_eq!(context_window(&turns(1), 5, Some("")).len(), 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::new(ChatRole::Assistant, "hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }
}
