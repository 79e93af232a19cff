//! Incremental text pipeline for streamed model output.
//!
//! A pipeline is a chain (or tree) of [`Node`]s. Each node owns one
//! [`StreamNode`] stage that turns an input unit into zero or more output
//! units, plus the downstream [`Sink`]s those outputs are forwarded to.
//! Forwarding is sequential: every output is fully handled downstream before
//! the next one, so a single text stream keeps its order end to end.
//!
//! The stock chain used by chatting agents is
//!
//! ```text
//! SentenceSepNode ──▶ BracketsParsorNode ──▶ CallbackNode
//!   (deltas → sentences)   (sentences → text/tag)   (emit)
//! ```
//!
//! ```rust,ignore
//! let graph = Node::new(SentenceSepNode::default())
//!     .connect_to(Node::new(BracketsParsorNode::default())
//!         .connect_to(CallbackNode::new(|segment| async move { println!("{segment:?}") })));
//! ```

mod brackets;
mod node;
mod sentence;

#[cfg(test)]
mod tests;

pub use brackets::{BracketsParsorNode, Segment, DEFAULT_BRACKETS};
pub use node::{CallbackNode, Node, Sink, StreamNode};
pub use sentence::{SentenceSepNode, DEFAULT_SEPARATORS};
