//! Agent configuration loading from file and environment variables.

use serde::Deserialize;
use silicon_bot::BotConfig;
use silicon_stream::DEFAULT_SEPARATORS;
use silicon_types::voice::VoiceProfile;
use silicon_types::LoggingConfig;
use thiserror::Error;

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Relay address; `http(s)://`, `ws(s)://` or a bare `host:port`.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Name the agent registers under. Frontends connect with the same name.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Registered agent type to build.
    #[serde(default = "default_agent_type")]
    pub agent_type: String,

    /// Language-model settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Speech synthesis settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Sentence splitting settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// When off, `say_aloud` events carry no audio.
    #[serde(default)]
    pub enabled: bool,

    /// Directory that relative model paths are resolved against.
    #[serde(default = "default_voices_dir")]
    pub voices_dir: String,

    /// Piper executable.
    #[serde(default = "default_piper_binary")]
    pub piper_binary: String,

    /// `espeak-ng` executable for `system` voice profiles.
    #[serde(default = "default_espeak_binary")]
    pub espeak_binary: String,

    /// Voice to speak with. Defaults to a Piper profile named after the agent.
    #[serde(default)]
    pub profile: Option<VoiceProfile>,
}

/// Sentence splitter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Characters that end a sentence unit.
    #[serde(default = "default_separators")]
    pub separators: String,

    /// Whether the separator stays at the end of its unit.
    #[serde(default = "default_keep_separators")]
    pub keep_separators: bool,
}

fn default_server_url() -> String {
    "localhost:8000".to_string()
}

fn default_agent_name() -> String {
    "shumeiniang".to_string()
}

fn default_agent_type() -> String {
    "basic_chatting".to_string()
}

fn default_voices_dir() -> String {
    "voices".to_string()
}

fn default_espeak_binary() -> String {
    "espeak-ng".to_string()
}

fn default_piper_binary() -> String {
    "piper".to_string()
}

fn default_separators() -> String {
    DEFAULT_SEPARATORS.to_string()
}

fn default_keep_separators() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            agent_name: default_agent_name(),
            agent_type: default_agent_type(),
            bot: BotConfig::default(),
            voice: VoiceConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voices_dir: default_voices_dir(),
            piper_binary: default_piper_binary(),
            espeak_binary: default_espeak_binary(),
            profile: None,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            separators: default_separators(),
            keep_separators: default_keep_separators(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SILICON_SERVER_URL` overrides `server_url`
/// - `SILICON_AGENT_NAME` overrides `agent_name`
/// - `SILICON_LLM_TOKEN` overrides `bot.token`
/// - `SILICON_LLM_MODEL` overrides `bot.model_name`
/// - `SILICON_LOG_LEVEL`, `SILICON_LOG_JSON`, `SILICON_LOG_FILE` override `logging`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<AgentConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                AgentConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => AgentConfig::default(),
    };

    if let Ok(url) = std::env::var("SILICON_SERVER_URL") {
        config.server_url = url;
    }
    if let Ok(name) = std::env::var("SILICON_AGENT_NAME") {
        if !name.trim().is_empty() {
            config.agent_name = name;
        }
    }
    if let Ok(token) = std::env::var("SILICON_LLM_TOKEN") {
        config.bot.token = token;
    }
    if let Ok(model) = std::env::var("SILICON_LLM_MODEL") {
        config.bot.model_name = model;
    }
    config.logging.apply_env("SILICON");

    Ok(config)
}
