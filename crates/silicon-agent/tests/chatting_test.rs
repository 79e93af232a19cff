mod common;

use common::{
    assert_no_frame, next_frame, send_user_input, ws_pair, BrokenSynthesizer, FakeSynthesizer,
    ScriptedBot, Step,
};
use futures_util::StreamExt;
use serde_json::json;
use silicon_agent::{Agent, ChattingAgent};
use silicon_bot::{ChatMessage, ChatRole};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

fn spawn_agent(chatting: &ChattingAgent, agent_ws: common::RelaySide) {
    let mut agent = Agent::new("localhost:8000", "mio");
    chatting.install(&mut agent);
    tokio::spawn(async move { agent.serve(agent_ws).await });
}

/// Waits for the running generation to finish.
async fn settle(chatting: &ChattingAgent) {
    for _ in 0..100 {
        if !chatting.is_generating() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation did not finish");
}

#[tokio::test]
async fn streams_sentences_with_audio_and_tags() {
    let (mut relay, agent_ws) = ws_pair().await;
    let (bot, _) = ScriptedBot::new(vec![vec![
        Step::Delta("[smile]Hi the"),
        Step::Delta("re! How are"),
        Step::Delta(" you"),
    ]]);
    let synth = Arc::new(FakeSynthesizer::default());
    let chatting = ChattingAgent::new(Box::new(bot), synth.clone());
    spawn_agent(&chatting, agent_ws);

    send_user_input(&mut relay, "hello").await;

    let mut events = Vec::new();
    for _ in 0..6 {
        events.push(next_frame(&mut relay).await["data"].clone());
    }
    assert_eq!(
        events,
        vec![
            json!({"type": "bracket_tag", "content": "smile"}),
            json!({"type": "say_aloud", "content": "Hi ", "media_data": "UklGRg=="}),
            json!({"type": "say_aloud", "content": "there!", "media_data": "UklGRg=="}),
            json!({"type": "say_aloud", "content": "How ", "media_data": "UklGRg=="}),
            json!({"type": "say_aloud", "content": "are ", "media_data": "UklGRg=="}),
            json!({"type": "say_aloud", "content": "you", "media_data": "UklGRg=="}),
        ]
    );
    assert_no_frame(&mut relay, Duration::from_millis(200)).await;

    settle(&chatting).await;
    assert_eq!(
        chatting.context().await,
        vec![
            ChatMessage::new(ChatRole::User, "hello"),
            ChatMessage::new(ChatRole::Assistant, "[smile]Hi there! How are you"),
        ]
    );
    assert_eq!(synth.spoken.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn new_input_interrupts_and_records_partial_reply() {
    let (mut relay, agent_ws) = ws_pair().await;
    let (bot, calls) = ScriptedBot::new(vec![
        vec![Step::Delta("Hello, wor"), Step::Hang],
        vec![Step::Delta("Fine"), Step::Delta(".")],
    ]);
    let chatting = ChattingAgent::new(Box::new(bot), Arc::new(FakeSynthesizer::default()));
    spawn_agent(&chatting, agent_ws);

    send_user_input(&mut relay, "hi").await;
    let first = next_frame(&mut relay).await;
    assert_eq!(first["data"]["content"], "Hello,");

    send_user_input(&mut relay, "again").await;
    let second = next_frame(&mut relay).await;
    // "wor" was buffered in the splitter when the reply was cut; it must not
    // leak into the next reply.
    assert_eq!(
        second["data"],
        json!({"type": "say_aloud", "content": "Fine.", "media_data": "UklGRg=="})
    );
    assert_no_frame(&mut relay, Duration::from_millis(200)).await;

    settle(&chatting).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        chatting.context().await,
        vec![
            ChatMessage::new(ChatRole::User, "hi"),
            ChatMessage::new(ChatRole::Assistant, "Hello, ... (interrupted)"),
            ChatMessage::new(ChatRole::User, "again"),
            ChatMessage::new(ChatRole::Assistant, "Fine."),
        ]
    );
    assert_eq!(chatting.pending_text().await, "");
    assert_eq!(chatting.partial_response().await, "");
}

#[tokio::test]
async fn superseded_reply_stops_reaching_the_relay() {
    let (mut relay, agent_ws) = ws_pair().await;
    let mut old_reply = vec![Step::Delta("old0."), Step::Pause(300)];
    for delta in ["old1.", "old2.", "old3.", "old4.", "old5.", "old6."] {
        old_reply.push(Step::Delta(delta));
        old_reply.push(Step::Pause(30));
    }
    let (bot, _) = ScriptedBot::new(vec![
        old_reply,
        vec![Step::Pause(100), Step::Delta("New.")],
    ]);
    let chatting = ChattingAgent::new(Box::new(bot), Arc::new(FakeSynthesizer::default()));
    spawn_agent(&chatting, agent_ws);

    send_user_input(&mut relay, "a").await;
    assert_eq!(next_frame(&mut relay).await["data"]["content"], "old0.");

    // The old reply would keep streaming for another half second.
    send_user_input(&mut relay, "b").await;
    let mut after = Vec::new();
    while let Ok(Some(Ok(Message::Text(text)))) =
        tokio::time::timeout(Duration::from_millis(800), relay.next()).await
    {
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        after.push(frame["data"]["content"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(after, vec!["New.".to_string()]);

    settle(&chatting).await;
    let context = chatting.context().await;
    assert_eq!(
        context,
        vec![
            ChatMessage::new(ChatRole::User, "a"),
            ChatMessage::new(ChatRole::Assistant, "old0. ... (interrupted)"),
            ChatMessage::new(ChatRole::User, "b"),
            ChatMessage::new(ChatRole::Assistant, "New."),
        ]
    );
    assert_eq!(
        context
            .iter()
            .filter(|m| m.content.ends_with("... (interrupted)"))
            .count(),
        1
    );
}

#[tokio::test]
async fn blank_input_interrupts_without_calling_the_bot() {
    let (mut relay, agent_ws) = ws_pair().await;
    let (bot, calls) = ScriptedBot::new(vec![vec![Step::Delta("One. Two"), Step::Hang]]);
    let chatting = ChattingAgent::new(Box::new(bot), Arc::new(FakeSynthesizer::default()));
    spawn_agent(&chatting, agent_ws);

    send_user_input(&mut relay, "count").await;
    assert_eq!(next_frame(&mut relay).await["data"]["content"], "One.");

    send_user_input(&mut relay, "   ").await;
    assert_no_frame(&mut relay, Duration::from_millis(200)).await;

    settle(&chatting).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        chatting.context().await,
        vec![
            ChatMessage::new(ChatRole::User, "count"),
            ChatMessage::new(ChatRole::Assistant, "One. ... (interrupted)"),
        ]
    );
}

#[tokio::test]
async fn interrupt_without_new_input_is_recorded_on_next_turn() {
    let (mut relay, agent_ws) = ws_pair().await;
    let (bot, _) = ScriptedBot::new(vec![
        vec![Step::Delta("[wave] Bye"), Step::Hang],
        vec![Step::Delta("Back.")],
    ]);
    let chatting = ChattingAgent::new(Box::new(bot), Arc::new(FakeSynthesizer::default()));
    spawn_agent(&chatting, agent_ws);

    send_user_input(&mut relay, "leave").await;
    assert_eq!(next_frame(&mut relay).await["data"]["type"], "bracket_tag");

    chatting.interrupt();
    settle(&chatting).await;

    send_user_input(&mut relay, "return").await;
    assert_eq!(next_frame(&mut relay).await["data"]["content"], "Back.");
    settle(&chatting).await;

    let context = chatting.context().await;
    assert_eq!(context[1], ChatMessage::new(ChatRole::Assistant, "[wave] ... (interrupted)"));
    assert_eq!(context.len(), 4);
}

#[tokio::test]
async fn synthesis_failure_still_emits_text() {
    let (mut relay, agent_ws) = ws_pair().await;
    let (bot, _) = ScriptedBot::new(vec![vec![Step::Delta("Still here.")]]);
    let chatting = ChattingAgent::new(Box::new(bot), Arc::new(BrokenSynthesizer));
    spawn_agent(&chatting, agent_ws);

    send_user_input(&mut relay, "hello?").await;
    let frames = [next_frame(&mut relay).await, next_frame(&mut relay).await];
    assert_eq!(
        frames[0]["data"],
        json!({"type": "say_aloud", "content": "Still ", "media_data": ""})
    );
    assert_eq!(frames[1]["data"]["content"], "here.");
}
