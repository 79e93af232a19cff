//! Routing between the agent and frontend sides of the relay.

use crate::presence::AgentPresence;
use crate::registry::{ConnectionInfo, ConnectionRegistry, Delivery};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use silicon_types::{
    parse_incoming, IncomingMessage, OutgoingMessage, ProtocolError, RelayedEnvelope, Role,
};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors raised by the relay router.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Another agent session already holds this name.
    #[error("agent name already connected: {0}")]
    AgentNameTaken(String),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What the socket loop should do after a frame was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send this frame back to the sender only.
    Reply(OutgoingMessage),
    /// Nothing to send.
    Ignore,
    /// The session was removed; close the socket.
    Close,
}

/// Owns both registries and the agent presence set.
pub struct RelayRouter {
    agents: ConnectionRegistry,
    frontends: ConnectionRegistry,
    presence: AgentPresence,
}

impl RelayRouter {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            agents: ConnectionRegistry::new(Role::Agent, send_timeout),
            frontends: ConnectionRegistry::new(Role::Frontend, send_timeout),
            presence: AgentPresence::new(),
        }
    }

    pub fn registry(&self, role: Role) -> &ConnectionRegistry {
        match role {
            Role::Agent => &self.agents,
            Role::Frontend => &self.frontends,
        }
    }

    pub fn presence(&self) -> &AgentPresence {
        &self.presence
    }

    pub fn is_agent_online(&self, name: &str) -> bool {
        self.presence.contains(name)
    }

    /// Registers a session.
    ///
    /// Agent sessions first claim their name; a held name is refused with
    /// [`RelayError::AgentNameTaken`] and nothing is registered.
    pub async fn connect(
        &self,
        role: Role,
        name: &str,
        sender: mpsc::Sender<String>,
    ) -> Result<Uuid, RelayError> {
        if role == Role::Agent && !self.presence.claim(name) {
            return Err(RelayError::AgentNameTaken(name.to_string()));
        }
        Ok(self.registry(role).accept(name, sender).await)
    }

    /// Removes a session and, for agents, releases the name it held.
    ///
    /// Idempotent: a second call (or a call for an already evicted session)
    /// returns `None` and releases nothing.
    pub async fn disconnect(&self, role: Role, session_id: Uuid) -> Option<ConnectionInfo> {
        let info = self.registry(role).remove(session_id).await?;
        self.release_if_agent(&info);
        Some(info)
    }

    fn release_if_agent(&self, info: &ConnectionInfo) {
        if info.role == Role::Agent && self.presence.release(&info.agent_name) {
            tracing::info!(agent_name = %info.agent_name, "agent name released");
        }
    }

    /// Queues a frame for one session.
    pub async fn send_to(
        &self,
        role: Role,
        session_id: Uuid,
        frame: &OutgoingMessage,
    ) -> Result<(), RelayError> {
        let payload = serde_json::to_string(frame)?;
        if let Err(e) = self.registry(role).send(session_id, payload).await {
            if let Some(info) = e.evicted() {
                self.release_if_agent(info);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Queues `payload` for every session of `role` except `exclude`.
    pub async fn broadcast(&self, role: Role, payload: &str, exclude: Option<Uuid>) -> Delivery {
        let delivery = self.registry(role).broadcast(payload, exclude).await;
        for info in &delivery.evicted {
            self.release_if_agent(info);
        }
        delivery
    }

    /// Handles one text frame from `session_id` of `role`.
    pub async fn handle_text(&self, role: Role, session_id: Uuid, text: &str) -> Outcome {
        let message = match parse_incoming(text) {
            Ok(message) => message,
            Err(ProtocolError::Malformed(e)) => {
                tracing::debug!(
                    role = %role,
                    session_id = %session_id,
                    "ignoring malformed frame: {}",
                    e
                );
                return Outcome::Ignore;
            }
            Err(e) => return Outcome::Reply(OutgoingMessage::error(e.to_string())),
        };

        match message {
            IncomingMessage::Event { data } => {
                self.route(role, session_id, data).await;
                Outcome::Reply(OutgoingMessage::success("event sent"))
            }
            IncomingMessage::Disconnect => {
                self.disconnect(role, session_id).await;
                Outcome::Close
            }
            IncomingMessage::IsAgentOnline if role == Role::Frontend => {
                let online = match self.registry(role).name_of(session_id).await {
                    Some(name) => self.is_agent_online(&name),
                    None => false,
                };
                Outcome::Reply(OutgoingMessage::success(online))
            }
            other => Outcome::Reply(OutgoingMessage::error(
                ProtocolError::UnsupportedType(other.kind().to_string()).to_string(),
            )),
        }
    }

    /// Delivers `data` to every opposite-role session sharing the sender's
    /// name. Returns how many sessions it was queued for.
    pub async fn route(&self, role: Role, from: Uuid, data: Value) -> usize {
        let Some(name) = self.registry(role).name_of(from).await else {
            return 0;
        };

        let target_role = role.opposite();
        let targets = self.registry(target_role).lookup_by_name(&name).await;
        if targets.is_empty() {
            tracing::debug!(from = %role, agent_name = %name, "no recipients, dropping event");
            return 0;
        }

        let envelope = RelayedEnvelope {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            data,
        };
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to encode relayed envelope: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for target in targets {
            match self.registry(target_role).send(target, payload.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    if let Some(info) = e.evicted() {
                        self.release_if_agent(info);
                    }
                }
            }
        }

        tracing::debug!(
            from = %role,
            agent_name = %name,
            delivered,
            "event relayed"
        );
        delivered
    }
}
