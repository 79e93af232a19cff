//! Silicon agent binary.
//!
//! Loads the agent configuration, connects to the relay and serves until the
//! connection ends or SIGTERM/SIGINT arrives.

use silicon_agent::{config, create_agent, AgentError};
use std::process::ExitCode;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SILICON_AGENT_CONFIG") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() -> ExitCode {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("agent.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the agent cannot start without valid config");

    config
        .logging
        .init_subscriber()
        .expect("failed to open log file, check logging.file in config");

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        agent_type = %config.agent_type,
        "resolved startup configuration path"
    );

    if config.bot.token.is_empty() {
        tracing::warn!("bot token is empty, set bot.token or SILICON_LLM_TOKEN");
    }

    let agent = match create_agent(&config).await {
        Ok(agent) => agent,
        Err(e) => {
            tracing::error!("failed to build agent: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = agent.run() => result,
        () = shutdown_signal() => Ok(()),
    };

    match result {
        Ok(()) => {
            tracing::info!(agent_name = agent.name(), "silicon agent shut down");
            ExitCode::SUCCESS
        }
        Err(AgentError::Rejected { name, reason, .. }) => {
            tracing::error!(agent_name = %name, "relay refused the agent: {}", reason);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(agent_name = agent.name(), "agent stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
        () = terminate => { tracing::info!("received SIGTERM, shutting down"); }
    }
}
