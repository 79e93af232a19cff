//! WebSocket endpoints for agents and frontends.

use crate::relay::{Outcome, RelayError};
use crate::AppState;
use axum::{
    extract::{
        ws::{CloseFrame, Message as AxumMessage, WebSocket},
        Extension, Path, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use silicon_types::{
    OutgoingMessage, Role, AGENT_NAME_TAKEN_CLOSE_CODE, AGENT_NAME_TAKEN_REASON,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// How long the writer may take to flush and close after the session ends.
const WRITER_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// `GET /ws/agent/{agent_name}`
pub async fn agent_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_name): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Agent, agent_name))
}

/// `GET /ws/frontend/{agent_name}`
pub async fn frontend_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_name): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Frontend, agent_name))
}

/// Serves one relay session until the peer leaves or asks to disconnect.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, role: Role, agent_name: String) {
    let (mut sender, mut receiver) = socket.split();

    // A peer that stops draining this queue hits the registry send timeout.
    let (tx, mut rx) = mpsc::channel::<String>(state.session_queue);

    let session_id = match state.router.connect(role, &agent_name, tx).await {
        Ok(id) => id,
        Err(RelayError::AgentNameTaken(_)) => {
            tracing::error!(
                agent_name = %agent_name,
                "agent name is already connected, refusing second connection"
            );
            let close = CloseFrame {
                code: AGENT_NAME_TAKEN_CLOSE_CODE,
                reason: AGENT_NAME_TAKEN_REASON.into(),
            };
            if let Err(e) = sender.send(AxumMessage::Close(Some(close))).await {
                tracing::debug!("failed to send rejection close frame: {}", e);
            }
            return;
        }
        Err(e) => {
            tracing::error!(agent_name = %agent_name, "failed to register session: {}", e);
            return;
        }
    };

    // The writer ends once the registry drops the session's sender.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                return;
            }
        }
        if let Err(e) = sender.send(AxumMessage::Close(None)).await {
            tracing::debug!("failed to send close frame: {}", e);
        }
    });

    send_welcome(&state, role, session_id).await;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => {
                match state.router.handle_text(role, session_id, text.as_str()).await {
                    Outcome::Reply(frame) => {
                        if let Err(e) = state.router.send_to(role, session_id, &frame).await {
                            tracing::warn!(
                                role = %role,
                                session_id = %session_id,
                                "failed to reply: {}",
                                e
                            );
                            break;
                        }
                    }
                    Outcome::Ignore => {}
                    Outcome::Close => break,
                }
            }
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    state.router.disconnect(role, session_id).await;

    if tokio::time::timeout(WRITER_CLOSE_GRACE, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }

    tracing::info!(role = %role, agent_name = %agent_name, session_id = %session_id, "session ended");
}

async fn send_welcome(state: &AppState, role: Role, session_id: Uuid) {
    let welcome = OutgoingMessage::System {
        message: "successfully connected".to_string(),
        client_id: session_id.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    };
    if let Err(e) = state.router.send_to(role, session_id, &welcome).await {
        tracing::warn!(session_id = %session_id, "failed to send welcome: {}", e);
    }
}
