//! A voice chat agent that can be interrupted mid-reply.
//!
//! Each `user_input` starts a new generation: the bot streams its reply, the
//! stream graph cuts it into sentences and bracket tags, and every sentence
//! is synthesized and emitted as `say_aloud` while tags go out as
//! `bracket_tag`. A new input arriving while a reply is still streaming
//! cancels it, records what had been said so far as an interrupted
//! assistant turn, and starts over.

use crate::runtime::{Agent, AgentContext, Handler};
use async_trait::async_trait;
use silicon_bot::{Bot, BotEvent, BotEventHandler, ChatMessage, ChatRole};
use silicon_stream::{BracketsParsorNode, CallbackNode, Node, Segment, SentenceSepNode, Sink};
use silicon_types::AgentEvent;
use silicon_voice::{encode_audio, Synthesizer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Appended to the partial reply when a generation is interrupted.
pub const INTERRUPTED_MARKER: &str = " ... (interrupted)";

/// Event type this agent reacts to.
pub const USER_INPUT_EVENT: &str = "user_input";

/// Conversation state, owned by whichever generation holds the lock.
struct Conversation {
    bot: Box<dyn Bot>,
    graph: Node<SentenceSepNode>,
    segments: mpsc::UnboundedReceiver<Segment>,
    /// Text (and `[tag]`s) emitted so far in the current reply.
    partial_response: String,
    /// A user turn is waiting for its assistant turn.
    turn_open: bool,
}

impl Conversation {
    /// Closes out an unfinished reply and clears all per-reply state.
    fn recover_from_interruption(&mut self) {
        if self.turn_open {
            let marker = format!("{}{}", self.partial_response, INTERRUPTED_MARKER);
            tracing::info!(partial = %self.partial_response, "reply was interrupted");
            self.bot.append_context(&marker, ChatRole::Assistant);
            self.turn_open = false;
        }
        self.partial_response.clear();
        self.graph.reset();
        while self.segments.try_recv().is_ok() {}
    }
}

struct Generation {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Chat agent with sentence-level speech and interruption.
#[derive(Clone)]
pub struct ChattingAgent {
    conversation: Arc<tokio::sync::Mutex<Conversation>>,
    generation: Arc<Mutex<Option<Generation>>>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl ChattingAgent {
    /// Builds the agent with the default sentence separators.
    pub fn new(bot: Box<dyn Bot>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self::with_splitter(bot, synthesizer, SentenceSepNode::default())
    }

    /// Builds the agent around a custom sentence splitter.
    pub fn with_splitter(
        bot: Box<dyn Bot>,
        synthesizer: Arc<dyn Synthesizer>,
        splitter: SentenceSepNode,
    ) -> Self {
        let (tx, segments) = mpsc::unbounded_channel();
        let collect = CallbackNode::new(move |segment: Segment| {
            let tx = tx.clone();
            async move {
                if tx.send(segment).is_err() {
                    tracing::debug!("segment receiver dropped");
                }
            }
        });
        let graph = Node::new(splitter)
            .connect_to(Node::new(BracketsParsorNode::default()).connect_to(collect));

        Self {
            conversation: Arc::new(tokio::sync::Mutex::new(Conversation {
                bot,
                graph,
                segments,
                partial_response: String::new(),
                turn_open: false,
            })),
            generation: Arc::new(Mutex::new(None)),
            synthesizer,
        }
    }

    /// Registers the `user_input` handler on `agent`.
    pub fn install(&self, agent: &mut Agent) {
        let this = self.clone();
        agent.on(
            USER_INPUT_EVENT,
            Handler::inline(move |ctx, event| {
                this.handle_user_input(ctx, event.content().unwrap_or_default());
            }),
        );
    }

    fn generation(&self) -> MutexGuard<'_, Option<Generation>> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels the running generation (if any) and starts one for `input`.
    ///
    /// Must be called from within the tokio runtime. Cancelling and starting
    /// happen under one lock, so two inputs can never leave two generations
    /// running.
    pub fn handle_user_input(&self, ctx: &AgentContext, input: &str) {
        let mut generation = self.generation();
        if let Some(previous) = generation.take() {
            previous.token.cancel();
            previous.handle.abort();
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_generation(
            self.conversation.clone(),
            self.synthesizer.clone(),
            ctx.clone(),
            input.to_string(),
            token.clone(),
        ));
        *generation = Some(Generation { token, handle });
    }

    /// Cancels the running generation without starting a new one.
    ///
    /// The interrupted turn is recorded when the next generation starts.
    pub fn interrupt(&self) {
        if let Some(previous) = self.generation().take() {
            previous.token.cancel();
            previous.handle.abort();
        }
    }

    /// Whether a generation is still running.
    pub fn is_generating(&self) -> bool {
        self.generation()
            .as_ref()
            .is_some_and(|g| !g.handle.is_finished())
    }

    /// Snapshot of the bot context.
    pub async fn context(&self) -> Vec<ChatMessage> {
        self.conversation.lock().await.bot.messages().to_vec()
    }

    /// Text emitted so far in the current reply.
    pub async fn partial_response(&self) -> String {
        self.conversation.lock().await.partial_response.clone()
    }

    /// Text still buffered in the sentence splitter.
    pub async fn pending_text(&self) -> String {
        self.conversation.lock().await.graph.stage().buffer().to_string()
    }
}

async fn run_generation(
    conversation: Arc<tokio::sync::Mutex<Conversation>>,
    synthesizer: Arc<dyn Synthesizer>,
    ctx: AgentContext,
    input: String,
    token: CancellationToken,
) {
    let mut guard = conversation.lock().await;
    if token.is_cancelled() {
        return;
    }
    let conversation = &mut *guard;
    conversation.recover_from_interruption();

    if input.trim().is_empty() {
        return;
    }
    conversation.bot.append_context(&input, ChatRole::User);
    conversation.turn_open = true;

    let Conversation {
        bot,
        graph,
        segments,
        partial_response,
        turn_open,
    } = conversation;

    let mut responder = Responder {
        graph,
        segments,
        partial_response,
        synthesizer: synthesizer.as_ref(),
        ctx: &ctx,
        token: &token,
    };
    let reply = bot.respond_to_context(&mut responder).await;

    if token.is_cancelled() {
        return;
    }
    bot.append_context(&reply, ChatRole::Assistant);
    partial_response.clear();
    *turn_open = false;
    tracing::debug!(agent_name = ctx.agent_name(), chars = reply.chars().count(), "reply finished");
}

/// Feeds bot output through the graph and emits the resulting segments.
struct Responder<'a> {
    graph: &'a mut Node<SentenceSepNode>,
    segments: &'a mut mpsc::UnboundedReceiver<Segment>,
    partial_response: &'a mut String,
    synthesizer: &'a dyn Synthesizer,
    ctx: &'a AgentContext,
    token: &'a CancellationToken,
}

impl Responder<'_> {
    async fn deliver_segments(&mut self) {
        while let Ok(segment) = self.segments.try_recv() {
            if self.token.is_cancelled() {
                return;
            }
            let event = match segment {
                Segment::Text { content } => {
                    let media_data = match self.synthesizer.synthesize(&content).await {
                        Ok(audio) => encode_audio(&audio),
                        Err(e) => {
                            tracing::warn!(text = %content, "speech synthesis failed: {}", e);
                            String::new()
                        }
                    };
                    if self.token.is_cancelled() {
                        return;
                    }
                    self.partial_response.push_str(&content);
                    AgentEvent::SayAloud {
                        content,
                        media_data,
                    }
                }
                Segment::Tag { content } => {
                    self.partial_response.push('[');
                    self.partial_response.push_str(&content);
                    self.partial_response.push(']');
                    AgentEvent::BracketTag { content }
                }
            };

            if let Err(e) = self.ctx.emit(&event) {
                tracing::warn!(agent_name = self.ctx.agent_name(), "failed to emit event: {}", e);
            }
        }
    }
}

#[async_trait]
impl BotEventHandler for Responder<'_> {
    async fn on_event(&mut self, event: BotEvent) {
        if self.token.is_cancelled() {
            return;
        }
        match event {
            BotEvent::MessageDelta { content } => self.graph.handle(content).await,
            BotEvent::Done => self.graph.finish().await,
        }
        self.deliver_segments().await;
    }
}
