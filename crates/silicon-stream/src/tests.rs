//! Unit tests for the pipeline stages and their wiring.

use std::sync::{Arc, Mutex};

use crate::{BracketsParsorNode, CallbackNode, Node, Segment, SentenceSepNode, Sink, StreamNode};

fn text(s: &str) -> Segment {
    Segment::Text {
        content: s.to_string(),
    }
}

fn tag(s: &str) -> Segment {
    Segment::Tag {
        content: s.to_string(),
    }
}

/// Builds the stock chain and returns it with the list its sink appends to.
fn chat_graph() -> (Node<SentenceSepNode>, Arc<Mutex<Vec<Segment>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let graph = Node::new(SentenceSepNode::default()).connect_to(
        Node::new(BracketsParsorNode::default()).connect_to(CallbackNode::new(
            move |segment: Segment| {
                sink_seen.lock().unwrap().push(segment);
                async {}
            },
        )),
    );
    (graph, seen)
}

// ── SentenceSepNode ──────────────────────────────────────────────────

#[test]
fn sentence_sep_emits_one_segment_per_separator() {
    let mut node = SentenceSepNode::new(".!?", true);
    let chunks = ["Hel", "lo. How a", "re you?", " Fine! And", " you"];

    let mut emitted = Vec::new();
    for chunk in chunks {
        emitted.extend(node.process(chunk.to_string()));
    }

    assert_eq!(emitted, vec!["Hello.", " How are you?", " Fine!"]);
    assert!(emitted.iter().all(|s| s.ends_with(['.', '!', '?'])));
    assert_eq!(node.buffer(), " And you");
}

#[test]
fn sentence_sep_counts_adjacent_separators() {
    let mut node = SentenceSepNode::new(".", true);
    let out = node.process("Wait...".to_string());
    assert_eq!(out, vec!["Wait.", ".", "."]);
    assert_eq!(node.buffer(), "");
}

#[test]
fn sentence_sep_can_drop_separators() {
    let mut node = SentenceSepNode::new("，。", false);
    let out = node.process("你好，世界。再".to_string());
    assert_eq!(out, vec!["你好", "世界"]);
    assert_eq!(node.buffer(), "再");
}

#[test]
fn sentence_sep_flush_releases_remainder_once() {
    let mut node = SentenceSepNode::default();
    assert_eq!(node.process("no terminator".to_string()), vec!["no ".to_string()]);
    assert_eq!(node.flush(), vec!["terminator".to_string()]);
    assert!(node.flush().is_empty());
}

#[test]
fn sentence_sep_reset_discards_partial_text() {
    let mut node = SentenceSepNode::new(".", true);
    node.process("stale half sen".to_string());
    node.reset();
    assert_eq!(node.buffer(), "");
    assert_eq!(node.process("fresh.".to_string()), vec!["fresh."]);
}

// ── BracketsParsorNode ───────────────────────────────────────────────

#[test]
fn brackets_splits_text_and_tags_within_one_unit() {
    let mut node = BracketsParsorNode::default();
    let out = node.process("Hi [smile] there.".to_string());
    assert_eq!(out, vec![text("Hi "), tag("smile"), text(" there.")]);
}

#[test]
fn brackets_buffers_unclosed_tag_across_units() {
    let mut node = BracketsParsorNode::default();
    assert_eq!(node.process("[wave,".to_string()), vec![]);
    assert!(node.in_tag());
    assert_eq!(node.process(" smile".to_string()), vec![]);
    assert_eq!(
        node.process("] ok.".to_string()),
        vec![tag("wave, smile"), text(" ok.")]
    );
    assert!(!node.in_tag());
}

#[test]
fn brackets_supports_full_width_pairs() {
    let mut node = BracketsParsorNode::default();
    assert_eq!(
        node.process("【开心】好的。".to_string()),
        vec![tag("开心"), text("好的。")]
    );
}

#[test]
fn brackets_drops_blank_text_and_empty_tags() {
    let mut node = BracketsParsorNode::default();
    assert!(node.process(" ".to_string()).is_empty());
    assert!(node.process("[ ]".to_string()).is_empty());
}

#[test]
fn brackets_flush_returns_unclosed_tag_as_text() {
    let mut node = BracketsParsorNode::default();
    node.process("[never closed".to_string());
    assert_eq!(node.flush(), vec![text("[never closed")]);
    assert!(!node.in_tag());
}

#[test]
fn brackets_reset_forgets_open_tag() {
    let mut node = BracketsParsorNode::default();
    node.process("[half".to_string());
    node.reset();
    assert_eq!(node.process("plain]".to_string()), vec![text("plain]")]);
}

#[test]
fn segment_serializes_with_type_tag() {
    let json = serde_json::to_value(tag("smile")).unwrap();
    assert_eq!(json, serde_json::json!({"type": "tag", "content": "smile"}));
}

// ── Node wiring ──────────────────────────────────────────────────────

#[tokio::test]
async fn graph_forwards_in_input_order() {
    let (mut graph, seen) = chat_graph();

    for delta in ["He", "llo. [wa", "ve] Bye", "!"] {
        graph.handle(delta.to_string()).await;
    }

    assert_eq!(
        *seen.lock().unwrap(),
        vec![text("Hello."), tag("wave"), text("Bye!")]
    );
}

#[tokio::test]
async fn graph_finish_flushes_every_stage() {
    let (mut graph, seen) = chat_graph();
    graph.handle("trailing words".to_string()).await;
    seen.lock().unwrap().clear();

    graph.finish().await;

    assert_eq!(*seen.lock().unwrap(), vec![text("words")]);
    assert_eq!(graph.stage().buffer(), "");
}

#[tokio::test]
async fn graph_reset_prevents_leakage_into_next_turn() {
    let (mut graph, seen) = chat_graph();
    graph.handle("stale [tag".to_string()).await;
    seen.lock().unwrap().clear();

    graph.reset();
    assert_eq!(graph.stage().buffer(), "");

    graph.handle("Fresh.".to_string()).await;
    assert_eq!(*seen.lock().unwrap(), vec![text("Fresh.")]);
}

#[tokio::test]
async fn node_fans_out_to_every_downstream_sink_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (log.clone(), log.clone());
    let mut graph = Node::new(SentenceSepNode::new(".", true))
        .connect_to(CallbackNode::new(move |s: String| {
            a.lock().unwrap().push(format!("a:{s}"));
            async {}
        }))
        .connect_to(CallbackNode::new(move |s: String| {
            b.lock().unwrap().push(format!("b:{s}"));
            async {}
        }));

    graph.handle("x.y.".to_string()).await;

    assert_eq!(*log.lock().unwrap(), vec!["a:x.", "b:x.", "a:y.", "b:y."]);
}
