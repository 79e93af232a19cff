use crate::config::BotConfig;
use crate::context::{context_window, ChatMessage, ChatRole};
use crate::error::BotError;
use crate::event::{BotEventHandler, EventDispatcher};
use crate::sse::{SseDecoder, DONE_MARKER};
use crate::Bot;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Connect timeout for provider requests. The stream itself is unbounded.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Extracts `choices[0].delta.content` from a streamed completion chunk.
///
/// Returns `Ok(None)` for chunks that carry no text (role headers, usage).
pub fn extract_delta(payload: &str) -> Result<Option<String>, BotError> {
    let chunk: Value = serde_json::from_str(payload)?;
    Ok(chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string))
}

/// Streaming client for OpenAI-compatible chat completion APIs.
pub struct ChatCompletionsBot {
    client: reqwest::Client,
    config: BotConfig,
    messages: Vec<ChatMessage>,
}

impl ChatCompletionsBot {
    /// # Errors
    ///
    /// Returns [`BotError::Http`] if the HTTP client cannot be built.
    pub fn new(config: BotConfig) -> Result<Self, BotError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            config,
            messages: Vec::new(),
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Runs one streamed request, pushing text into `response` and deltas
    /// into `dispatcher` as they arrive. Returns once `[DONE]` or the end of
    /// the body is reached.
    async fn stream_reply(
        &self,
        dispatcher: &mut EventDispatcher<'_>,
        response: &mut String,
    ) -> Result<(), BotError> {
        let request = CompletionRequest {
            model: &self.config.model_name,
            messages: context_window(
                &self.messages,
                self.config.max_context_length,
                self.config.system_prompt.as_deref(),
            ),
            stream: true,
        };

        tracing::debug!(
            endpoint = self.config.endpoint(),
            model = %self.config.model_name,
            turns = request.messages.len(),
            "requesting streamed completion"
        );

        let reply = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let mut body = reply.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for payload in decoder.push(&chunk) {
                if payload == DONE_MARKER {
                    return Ok(());
                }
                match extract_delta(&payload) {
                    Ok(Some(text)) => {
                        response.push_str(&text);
                        dispatcher.delta(&text).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("skipping undecodable completion chunk: {}", e);
                    }
                }
            }
        }

        if let Some(payload) = decoder.finish() {
            if payload != DONE_MARKER {
                if let Ok(Some(text)) = extract_delta(&payload) {
                    response.push_str(&text);
                    dispatcher.delta(&text).await;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Bot for ChatCompletionsBot {
    fn append_context(&mut self, text: &str, role: ChatRole) {
        self.messages.push(ChatMessage::new(role, text));
    }

    fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    async fn respond_to_context(&mut self, handler: &mut dyn BotEventHandler) -> String {
        let mut dispatcher = EventDispatcher::new(handler);
        let mut response = String::new();

        if let Err(e) = self.stream_reply(&mut dispatcher, &mut response).await {
            tracing::warn!(
                api = %self.config.api_name,
                received_chars = response.chars().count(),
                "completion stream failed, ending reply early: {}",
                e
            );
        }

        dispatcher.done().await;
        response
    }
}
