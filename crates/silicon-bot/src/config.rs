use serde::Deserialize;
use std::fmt;

/// Endpoint used for `api_name = "glm"` when no `base_url` is configured.
pub const GLM_CHAT_COMPLETIONS_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

/// Endpoint used for `api_name = "openai"` when no `base_url` is configured.
pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

fn default_api_name() -> String {
    "glm".to_string()
}

fn default_model_name() -> String {
    "glm-4-flash".to_string()
}

fn default_max_context_length() -> usize {
    11
}

/// Settings for a language-model adapter.
#[derive(Clone, Deserialize)]
pub struct BotConfig {
    /// Provider preset: `glm` or `openai`.
    #[serde(default = "default_api_name")]
    pub api_name: String,
    /// Full chat completions URL, overriding the preset endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token for the provider.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Number of most recent turns sent with each request.
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_name: default_api_name(),
            base_url: None,
            token: String::new(),
            model_name: default_model_name(),
            system_prompt: None,
            max_context_length: default_max_context_length(),
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_name", &self.api_name)
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("model_name", &self.model_name)
            .field("system_prompt", &self.system_prompt)
            .field("max_context_length", &self.max_context_length)
            .finish()
    }
}

impl BotConfig {
    /// The chat completions URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.is_empty()) {
            return url;
        }
        match self.api_name.as_str() {
            "openai" => OPENAI_CHAT_COMPLETIONS_URL,
            _ => GLM_CHAT_COMPLETIONS_URL,
        }
    }
}
