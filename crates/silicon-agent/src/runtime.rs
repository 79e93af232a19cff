//! Connection, dispatch and background loops for an agent process.

use crate::error::AgentError;
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use silicon_types::{AGENT_NAME_TAKEN_CLOSE_CODE, LOOP_EVENT_TYPE};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};

/// How long one receive attempt waits before retrying.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Pause between two runs of a background loop.
pub const LOOP_INTERVAL: Duration = Duration::from_millis(100);

/// Rewrites a relay address into a WebSocket base URL.
///
/// `http://` becomes `ws://`, `https://` becomes `wss://`, a bare host gets
/// `ws://`, and trailing slashes are dropped.
pub fn normalize_server_url(server_url: &str) -> String {
    let url = server_url.trim();
    let url = if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{url}")
    };
    url.trim_end_matches('/').to_string()
}

/// A routed event as received from the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Relay timestamp (RFC 3339), if present.
    pub time: Option<String>,
    /// The event payload; its `type` field selects the handlers.
    pub data: Value,
}

impl InboundEvent {
    pub fn event_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }

    /// The `content` field carried by text events, if any.
    pub fn content(&self) -> Option<&str> {
        self.data.get("content").and_then(Value::as_str)
    }
}

enum Outbound {
    Frame(String),
    Disconnect,
}

/// Cloneable handle handlers and loops use to talk back to the relay.
#[derive(Clone)]
pub struct AgentContext {
    name: Arc<str>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl AgentContext {
    pub fn agent_name(&self) -> &str {
        &self.name
    }

    /// Sends `{"type": "event", "data": data}` to the relay.
    ///
    /// # Errors
    ///
    /// [`AgentError::Serialize`] if `data` cannot be encoded and
    /// [`AgentError::Closed`] once the connection is gone.
    pub fn emit<T: Serialize>(&self, data: &T) -> Result<(), AgentError> {
        let frame = json!({ "type": "event", "data": data }).to_string();
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| AgentError::Closed)
    }

    /// Asks the relay to end this session.
    pub fn disconnect(&self) -> Result<(), AgentError> {
        self.outbound
            .send(Outbound::Disconnect)
            .map_err(|_| AgentError::Closed)
    }

    /// Whether the connection writer is still accepting frames.
    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }
}

type InlineFn = dyn Fn(&AgentContext, &InboundEvent) + Send + Sync;
type DetachedFn = dyn Fn(AgentContext, InboundEvent) -> BoxFuture<'static, ()> + Send + Sync;
type LoopFn = dyn Fn(AgentContext) -> BoxFuture<'static, ()> + Send + Sync;

/// An event handler.
#[derive(Clone)]
pub enum Handler {
    /// Runs to completion on the receive loop before the next frame is read.
    Inline(Arc<InlineFn>),
    /// Spawned as its own task; the runtime keeps no handle to it.
    Detached(Arc<DetachedFn>),
}

impl Handler {
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&AgentContext, &InboundEvent) + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(f))
    }

    pub fn detached<F, Fut>(f: F) -> Self
    where
        F: Fn(AgentContext, InboundEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Detached(Arc::new(
            move |ctx: AgentContext, event: InboundEvent| -> BoxFuture<'static, ()> {
                Box::pin(f(ctx, event))
            },
        ))
    }
}

/// An agent process: handlers by event type plus background loops.
pub struct Agent {
    name: String,
    server_url: String,
    handlers: HashMap<String, Vec<Handler>>,
    loops: Vec<Arc<LoopFn>>,
}

impl Agent {
    pub fn new(server_url: &str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_url: normalize_server_url(server_url),
            handlers: HashMap::new(),
            loops: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// `{server_url}/ws/agent/{name}`
    pub fn endpoint(&self) -> String {
        format!("{}/ws/agent/{}", self.server_url, self.name)
    }

    /// Registers a handler for `event_type`. Handlers of one type run in
    /// registration order. The reserved `loop` type is refused.
    pub fn on(&mut self, event_type: &str, handler: Handler) -> &mut Self {
        if event_type == LOOP_EVENT_TYPE {
            tracing::warn!(
                agent_name = %self.name,
                "\"{}\" is reserved, use add_loop for background work",
                LOOP_EVENT_TYPE
            );
            return self;
        }
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        self
    }

    /// Registers a background loop. While connected, `callback` runs again
    /// [`LOOP_INTERVAL`] after each completion.
    pub fn add_loop<F, Fut>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(AgentContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.loops
            .push(Arc::new(move |ctx: AgentContext| -> BoxFuture<'static, ()> {
                Box::pin(callback(ctx))
            }));
        self
    }

    /// Connects to the relay and serves until the connection ends.
    ///
    /// # Errors
    ///
    /// [`AgentError::Transport`] if the connection fails and
    /// [`AgentError::Rejected`] if the relay refuses the agent name.
    pub async fn run(&self) -> Result<(), AgentError> {
        let endpoint = self.endpoint();
        tracing::info!(agent_name = %self.name, %endpoint, "connecting to relay");
        let (ws, _) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
        self.serve(ws).await
    }

    /// Serves an established WebSocket until it closes.
    pub async fn serve<S>(&self, ws: S) -> Result<(), AgentError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Send
            + 'static,
    {
        let (write, mut read) = ws.split();
        let (outbound, rx) = mpsc::unbounded_channel();
        let ctx = AgentContext {
            name: Arc::from(self.name.as_str()),
            outbound,
        };

        let writer = tokio::spawn(write_frames(write, rx));
        let loops: Vec<JoinHandle<()>> = self
            .loops
            .iter()
            .map(|callback| {
                let callback = callback.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    loop {
                        callback(ctx.clone()).await;
                        tokio::time::sleep(LOOP_INTERVAL).await;
                    }
                })
            })
            .collect();

        let result = loop {
            let frame = match tokio::time::timeout(RECEIVE_TIMEOUT, read.next()).await {
                Err(_) => continue,
                Ok(None) => break Ok(()),
                Ok(Some(Err(e))) => break Err(AgentError::Transport(e)),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => self.dispatch(&ctx, text.as_str()),
                Message::Close(close) => {
                    let code = close.as_ref().map(|c| u16::from(c.code));
                    tracing::info!(agent_name = %self.name, ?code, "relay closed the connection");
                    match close {
                        Some(c) if u16::from(c.code) == AGENT_NAME_TAKEN_CLOSE_CODE => {
                            break Err(AgentError::Rejected {
                                name: self.name.clone(),
                                code: AGENT_NAME_TAKEN_CLOSE_CODE,
                                reason: c.reason.as_str().to_string(),
                            });
                        }
                        _ => break Ok(()),
                    }
                }
                _ => {}
            }
        };

        for handle in loops {
            handle.abort();
        }
        writer.abort();
        result
    }

    fn dispatch(&self, ctx: &AgentContext, text: &str) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(agent_name = %self.name, "dropping malformed frame: {}", e);
                return;
            }
        };

        match frame.get("type").and_then(Value::as_str) {
            Some("system") => {
                let client_id = frame_str(&frame, "client_id");
                let message = frame_str(&frame, "message");
                tracing::info!(agent_name = %self.name, client_id, message, "relay system message");
                return;
            }
            Some("error") => {
                let message = frame_str(&frame, "message");
                tracing::warn!(agent_name = %self.name, message, "relay reported an error");
                return;
            }
            Some("success") => return,
            _ => {}
        }

        let event = InboundEvent {
            time: frame.get("time").and_then(Value::as_str).map(str::to_string),
            data: frame.get("data").cloned().unwrap_or(Value::Null),
        };
        let Some(event_type) = event.event_type() else {
            tracing::debug!(agent_name = %self.name, "dropping frame without event type");
            return;
        };
        if event_type == LOOP_EVENT_TYPE {
            return;
        }
        let Some(handlers) = self.handlers.get(event_type) else {
            tracing::debug!(agent_name = %self.name, event_type, "no handler registered");
            return;
        };

        for handler in handlers {
            match handler {
                Handler::Inline(f) => f(ctx, &event),
                Handler::Detached(f) => {
                    tokio::spawn(f(ctx.clone(), event.clone()));
                }
            }
        }
    }
}

fn frame_str<'a>(frame: &'a Value, key: &str) -> &'a str {
    frame.get(key).and_then(Value::as_str).unwrap_or_default()
}

async fn write_frames<W>(mut write: W, mut rx: mpsc::UnboundedReceiver<Outbound>)
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        let text = match outbound {
            Outbound::Frame(text) => text,
            Outbound::Disconnect => json!({ "type": "disconnect" }).to_string(),
        };
        if let Err(e) = write.send(Message::Text(text.into())).await {
            tracing::warn!("failed to send frame to relay: {}", e);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_server_urls() {
        assert_eq!(normalize_server_url("localhost:8000"), "ws://localhost:8000");
        assert_eq!(normalize_server_url("http://relay.local/"), "ws://relay.local");
        assert_eq!(normalize_server_url("https://relay.example.com//"), "wss://relay.example.com");
        assert_eq!(normalize_server_url("wss://relay.example.com"), "wss://relay.example.com");
        assert_eq!(normalize_server_url("ws://127.0.0.1:9/"), "ws://127.0.0.1:9");
    }

    #[test]
    fn endpoint_appends_agent_path() {
        let agent = Agent::new("http://localhost:8000/", "shumeiniang");
        assert_eq!(agent.endpoint(), "ws://localhost:8000/ws/agent/shumeiniang");
    }

    #[test]
    fn inbound_event_accessors() {
        let event = InboundEvent {
            time: None,
            data: json!({"type": "user_input", "content": "hi"}),
        };
        assert_eq!(event.event_type(), Some("user_input"));
        assert_eq!(event.content(), Some("hi"));

        let bare = InboundEvent { time: None, data: Value::Null };
        assert_eq!(bare.event_type(), None);
    }

    #[test]
    fn loop_type_cannot_be_registered() {
        let mut agent = Agent::new("localhost:8000", "mio");
        agent.on("loop", Handler::inline(|_, _| {}));
        agent.on("user_input", Handler::inline(|_, _| {}));
        assert!(!agent.handlers.contains_key("loop"));
        assert_eq!(agent.handlers["user_input"].len(), 1);
    }
}
