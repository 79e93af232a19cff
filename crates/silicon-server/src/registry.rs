//! Per-role registry of live WebSocket sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use silicon_types::Role;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Serializable snapshot of a registered session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub client_id: Uuid,
    pub agent_name: String,
    pub role: Role,
    pub join_time: DateTime<Utc>,
}

/// A registered session and the queue feeding its socket writer.
#[derive(Debug)]
struct Connection {
    name: String,
    created_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
}

/// Errors from delivering to a registered session.
///
/// Delivery failures have already evicted the session by the time the error
/// is returned; `evicted` carries what was removed (`None` if a concurrent
/// removal got there first).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session {0} is not registered")]
    UnknownSession(Uuid),

    #[error("session {id} writer is gone")]
    Closed {
        id: Uuid,
        evicted: Option<ConnectionInfo>,
    },

    #[error("session {id} did not drain its queue within {timeout:?}")]
    Timeout {
        id: Uuid,
        timeout: Duration,
        evicted: Option<ConnectionInfo>,
    },
}

impl RegistryError {
    /// The session removed as a result of this failure, if any.
    pub fn evicted(&self) -> Option<&ConnectionInfo> {
        match self {
            Self::UnknownSession(_) => None,
            Self::Closed { evicted, .. } | Self::Timeout { evicted, .. } => evicted.as_ref(),
        }
    }
}

/// Outcome of a [`ConnectionRegistry::broadcast`] sweep.
#[derive(Debug, Default)]
pub struct Delivery {
    pub delivered: usize,
    pub evicted: Vec<ConnectionInfo>,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<Uuid, Connection>,
    by_name: HashMap<String, HashSet<Uuid>>,
}

/// Sessions of one role, indexed by session id and by declared name.
///
/// Both maps change together under a single write lock. Senders are cloned
/// out of the lock before anything is awaited on them.
#[derive(Clone)]
pub struct ConnectionRegistry {
    role: Role,
    send_timeout: Duration,
    state: Arc<RwLock<RegistryState>>,
}

impl ConnectionRegistry {
    pub fn new(role: Role, send_timeout: Duration) -> Self {
        Self {
            role,
            send_timeout,
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Registers a session for `name` and returns its fresh id.
    pub async fn accept(&self, name: &str, sender: mpsc::Sender<String>) -> Uuid {
        let session_id = Uuid::new_v4();
        let connection = Connection {
            name: name.to_string(),
            created_at: Utc::now(),
            sender,
        };

        {
            let mut state = self.state.write().await;
            state.sessions.insert(session_id, connection);
            state
                .by_name
                .entry(name.to_string())
                .or_default()
                .insert(session_id);
        }

        tracing::info!(
            role = %self.role,
            agent_name = %name,
            session_id = %session_id,
            "session registered"
        );
        session_id
    }

    /// Removes a session. Unknown ids are a no-op returning `None`.
    pub async fn remove(&self, session_id: Uuid) -> Option<ConnectionInfo> {
        let removed = {
            let mut state = self.state.write().await;
            let connection = state.sessions.remove(&session_id)?;
            if let Some(ids) = state.by_name.get_mut(&connection.name) {
                ids.remove(&session_id);
                if ids.is_empty() {
                    state.by_name.remove(&connection.name);
                }
            }
            connection
        };

        tracing::info!(
            role = %self.role,
            agent_name = %removed.name,
            session_id = %session_id,
            "session removed"
        );
        Some(self.info(session_id, &removed))
    }

    /// Ids of every session registered under `name`.
    pub async fn lookup_by_name(&self, name: &str) -> HashSet<Uuid> {
        let state = self.state.read().await;
        state.by_name.get(name).cloned().unwrap_or_default()
    }

    pub async fn name_of(&self, session_id: Uuid) -> Option<String> {
        let state = self.state.read().await;
        state.sessions.get(&session_id).map(|c| c.name.clone())
    }

    pub async fn contains(&self, session_id: Uuid) -> bool {
        self.state.read().await.sessions.contains_key(&session_id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshots every session, oldest first.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let state = self.state.read().await;
        let mut infos: Vec<ConnectionInfo> = state
            .sessions
            .iter()
            .map(|(id, c)| self.info(*id, c))
            .collect();
        infos.sort_by_key(|info| info.join_time);
        infos
    }

    /// Queues `payload` for one session.
    ///
    /// A session whose writer is gone, or whose queue stays full for the
    /// send timeout, is removed before the error is returned.
    pub async fn send(&self, session_id: Uuid, payload: String) -> Result<(), RegistryError> {
        let sender = {
            let state = self.state.read().await;
            state.sessions.get(&session_id).map(|c| c.sender.clone())
        }
        .ok_or(RegistryError::UnknownSession(session_id))?;

        match sender.send_timeout(payload, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let evicted = self.remove(session_id).await;
                tracing::warn!(
                    role = %self.role,
                    session_id = %session_id,
                    "evicting session after failed delivery: {}",
                    e
                );
                Err(match e {
                    SendTimeoutError::Timeout(_) => RegistryError::Timeout {
                        id: session_id,
                        timeout: self.send_timeout,
                        evicted,
                    },
                    SendTimeoutError::Closed(_) => RegistryError::Closed {
                        id: session_id,
                        evicted,
                    },
                })
            }
        }
    }

    /// Queues `payload` for every session except `exclude`.
    ///
    /// Failing sessions are collected during the sweep and evicted after it.
    pub async fn broadcast(&self, payload: &str, exclude: Option<Uuid>) -> Delivery {
        let targets: Vec<(Uuid, mpsc::Sender<String>)> = {
            let state = self.state.read().await;
            state
                .sessions
                .iter()
                .filter(|(id, _)| Some(**id) != exclude)
                .map(|(id, c)| (*id, c.sender.clone()))
                .collect()
        };

        let mut delivery = Delivery::default();
        let mut failed = Vec::new();
        for (id, sender) in targets {
            match sender.send_timeout(payload.to_string(), self.send_timeout).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        role = %self.role,
                        session_id = %id,
                        "broadcast delivery failed: {}",
                        e
                    );
                    failed.push(id);
                }
            }
        }

        for id in failed {
            if let Some(info) = self.remove(id).await {
                delivery.evicted.push(info);
            }
        }
        delivery
    }

    fn info(&self, session_id: Uuid, connection: &Connection) -> ConnectionInfo {
        ConnectionInfo {
            client_id: session_id,
            agent_name: connection.name.clone(),
            role: self.role,
            join_time: connection.created_at,
        }
    }
}
