//! Language-model adapters for Silicon agents.
//!
//! A [`Bot`] keeps the conversation context and streams a response to it.
//! While streaming it reports progress through a [`BotEventHandler`]: one
//! [`BotEvent::MessageDelta`] per received chunk, then exactly one
//! [`BotEvent::Done`], even when the provider fails half way. The
//! [`EventDispatcher`] wrapper enforces that ordering for implementors.
//!
//! [`ChatCompletionsBot`] talks to any OpenAI-compatible streaming chat
//! completions endpoint; [`create_bot`] builds one from a [`BotConfig`].

pub mod chat_completions;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod sse;

pub use chat_completions::ChatCompletionsBot;
pub use config::BotConfig;
pub use context::{ChatMessage, ChatRole};
pub use error::BotError;
pub use event::{BotEvent, BotEventHandler, EventDispatcher};

use async_trait::async_trait;

/// A conversational model with local context.
#[async_trait]
pub trait Bot: Send {
    /// Appends a turn to the context. No I/O.
    fn append_context(&mut self, text: &str, role: ChatRole);

    /// The context accumulated so far, oldest first.
    fn messages(&self) -> &[ChatMessage];

    /// Streams a reply to the current context and returns the full text.
    ///
    /// The reply is not appended to the context; callers decide whether the
    /// turn is final.
    async fn respond_to_context(&mut self, handler: &mut dyn BotEventHandler) -> String;
}

/// Builds a bot for `config.api_name`.
///
/// # Errors
///
/// Returns [`BotError::UnknownApi`] for an unrecognised API name and
/// [`BotError::Http`] if the HTTP client cannot be built.
pub fn create_bot(config: BotConfig) -> Result<Box<dyn Bot>, BotError> {
    match config.api_name.as_str() {
        "glm" | "openai" => Ok(Box::new(ChatCompletionsBot::new(config)?)),
        other => Err(BotError::UnknownApi(other.to_string())),
    }
}
