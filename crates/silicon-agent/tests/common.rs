#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use silicon_bot::{Bot, BotEventHandler, ChatMessage, ChatRole, EventDispatcher};
use silicon_voice::{Synthesizer, VoiceError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// One step of a scripted reply.
#[derive(Debug, Clone)]
pub enum Step {
    Delta(&'static str),
    /// Waits this many milliseconds before the next step.
    Pause(u64),
    /// Never finishes; the generation has to be cancelled.
    Hang,
}

/// A bot that plays back one script per call.
pub struct ScriptedBot {
    messages: Vec<ChatMessage>,
    scripts: VecDeque<Vec<Step>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBot {
    pub fn new(scripts: Vec<Vec<Step>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let bot = Self {
            messages: Vec::new(),
            scripts: scripts.into(),
            calls: calls.clone(),
        };
        (bot, calls)
    }
}

#[async_trait]
impl Bot for ScriptedBot {
    fn append_context(&mut self, text: &str, role: ChatRole) {
        self.messages.push(ChatMessage::new(role, text));
    }

    fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    async fn respond_to_context(&mut self, handler: &mut dyn BotEventHandler) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.pop_front().unwrap_or_default();
        let mut dispatcher = EventDispatcher::new(handler);
        let mut reply = String::new();
        for step in script {
            match step {
                Step::Delta(text) => {
                    reply.push_str(text);
                    dispatcher.delta(text).await;
                    tokio::task::yield_now().await;
                }
                Step::Pause(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                Step::Hang => std::future::pending::<()>().await,
            }
        }
        dispatcher.done().await;
        reply
    }
}

/// Synthesizer returning a fixed WAV-looking payload and recording inputs.
#[derive(Default)]
pub struct FakeSynthesizer {
    pub spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(b"RIFF".to_vec())
    }
}

/// Synthesizer that always fails.
pub struct BrokenSynthesizer;

#[async_trait]
impl Synthesizer for BrokenSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, VoiceError> {
        Err(VoiceError::Tts("engine offline".to_string()))
    }
}

pub type RelaySide = WebSocketStream<DuplexStream>;

/// An in-memory WebSocket pair: the relay side for the test, the agent side
/// for `Agent::serve`.
pub async fn ws_pair() -> (RelaySide, WebSocketStream<DuplexStream>) {
    let (relay_io, agent_io) = tokio::io::duplex(64 * 1024);
    let relay = WebSocketStream::from_raw_socket(relay_io, Role::Server, None).await;
    let agent = WebSocketStream::from_raw_socket(agent_io, Role::Client, None).await;
    (relay, agent)
}

pub async fn send_event(relay: &mut RelaySide, data: Value) {
    let frame = json!({"time": "2025-01-01T00:00:00.000000Z", "data": data});
    relay
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("relay side send");
}

pub async fn send_user_input(relay: &mut RelaySide, content: &str) {
    send_event(relay, json!({"type": "user_input", "content": content})).await;
}

/// Next JSON text frame from the agent, failing after five seconds.
pub async fn next_frame(relay: &mut RelaySide) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), relay.next())
            .await
            .expect("timeout waiting for agent frame")
            .expect("agent side closed")
            .expect("frame error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("agent frames are JSON");
        }
    }
}

/// Asserts the agent sends nothing within `window`.
pub async fn assert_no_frame(relay: &mut RelaySide, window: Duration) {
    if let Ok(Some(Ok(frame))) = tokio::time::timeout(window, relay.next()).await {
        panic!("expected no frame, got: {:?}", frame);
    }
}
