use async_trait::async_trait;

/// Progress of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// A newly received chunk of reply text.
    MessageDelta { content: String },
    /// The reply is over (successfully or not).
    Done,
}

impl BotEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageDelta { .. } => "message_delta",
            Self::Done => "done",
        }
    }
}

/// Receives reply progress from a [`Bot`](crate::Bot).
#[async_trait]
pub trait BotEventHandler: Send {
    async fn on_event(&mut self, event: BotEvent);
}

/// Guards the event ordering contract: deltas only before `done`, and
/// `done` exactly once.
pub struct EventDispatcher<'a> {
    handler: &'a mut dyn BotEventHandler,
    done: bool,
}

impl<'a> EventDispatcher<'a> {
    pub fn new(handler: &'a mut dyn BotEventHandler) -> Self {
        Self {
            handler,
            done: false,
        }
    }

    /// Dispatches a delta; empty chunks and chunks after `done` are dropped.
    pub async fn delta(&mut self, content: &str) {
        if self.done || content.is_empty() {
            return;
        }
        self.handler
            .on_event(BotEvent::MessageDelta {
                content: content.to_string(),
            })
            .await;
    }

    /// Dispatches `done` the first time it is called.
    pub async fn done(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.handler.on_event(BotEvent::Done).await;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
