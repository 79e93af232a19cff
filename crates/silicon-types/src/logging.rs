//! Logging settings shared by the server and agent binaries.

use serde::Deserialize;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "silicon_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Optional file that receives a copy of every log line (appended).
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Applies the `<PREFIX>_LOG_LEVEL`, `<PREFIX>_LOG_JSON` and
    /// `<PREFIX>_LOG_FILE` environment overrides.
    pub fn apply_env(&mut self, prefix: &str) {
        if let Ok(level) = std::env::var(format!("{prefix}_LOG_LEVEL")) {
            self.level = level;
        }
        if let Ok(json) = std::env::var(format!("{prefix}_LOG_JSON")) {
            self.json = json == "true" || json == "1";
        }
        if let Ok(file) = std::env::var(format!("{prefix}_LOG_FILE")) {
            self.file = if file.trim().is_empty() { None } else { Some(file) };
        }
    }

    /// Installs the global `tracing` subscriber.
    ///
    /// Logs go to stdout (JSON when `json` is set) and, when `file` is set,
    /// are also appended to that file without ANSI colours. An invalid
    /// `level` falls back to `info`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the log file cannot be opened.
    pub fn init_subscriber(&self) -> std::io::Result<()> {
        let filter = EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"));

        let file_layer = match self.file.as_deref() {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
            }
            None => None,
        };

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);
        if self.json {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        Ok(())
    }
}
