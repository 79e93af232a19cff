//! Error types for the bot adapters.

/// Errors raised while building a bot or talking to its provider.
///
/// Streaming failures never reach `respond_to_context` callers; they are
/// logged and the stream ends with a normal `done` event.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// No adapter is registered under this API name.
    #[error("unknown bot api: {0}")]
    UnknownApi(String),

    /// The HTTP request or response stream failed.
    #[error("bot http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A streamed chunk could not be decoded.
    #[error("bot decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
