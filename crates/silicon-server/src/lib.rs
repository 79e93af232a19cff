//! Silicon relay server.
//!
//! Agents connect on `/ws/agent/{agent_name}` and frontends on
//! `/ws/frontend/{agent_name}`. Events are relayed between the two sides by
//! name; at most one agent session may hold a name at a time.

pub mod api_ws;
pub mod config;
pub mod presence;
pub mod registry;
pub mod relay;

use axum::{extract::Path, routing::get, Extension, Json, Router};
use relay::RelayRouter;
use serde_json::{json, Value};
use silicon_types::Role;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Default capacity of each session's outbound queue.
pub const DEFAULT_SESSION_QUEUE: usize = 256;

/// Default time a send may wait on a full session queue.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across all request handlers.
pub struct AppState {
    pub router: RelayRouter,
    /// Capacity of each session's outbound queue.
    pub session_queue: usize,
}

impl AppState {
    pub fn new(session_queue: usize, send_timeout: Duration) -> Self {
        Self {
            router: RelayRouter::new(send_timeout),
            session_queue: session_queue.max(1),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_QUEUE, DEFAULT_SEND_TIMEOUT)
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /api/online`: every live session on both sides.
async fn online_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let agents = state.router.registry(Role::Agent).connections().await;
    let frontends = state.router.registry(Role::Frontend).connections().await;
    Json(json!({
        "agents": agents,
        "frontends": frontends,
    }))
}

/// `GET /api/agents/{agent_name}/online`
async fn agent_online_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_name): Path<String>,
) -> Json<Value> {
    let online = state.router.is_agent_online(&agent_name);
    Json(json!({
        "agent_name": agent_name,
        "online": online,
    }))
}

/// Builds the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/online", get(online_handler))
        .route("/api/agents/{agent_name}/online", get(agent_online_handler))
        .route("/ws/agent/{agent_name}", get(api_ws::agent_ws_handler))
        .route("/ws/frontend/{agent_name}", get(api_ws::frontend_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(state))
}
