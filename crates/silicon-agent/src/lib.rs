//! Agent runtime for the Silicon relay.
//!
//! An [`Agent`] holds one WebSocket connection to the relay under its name,
//! dispatches routed events to registered [`Handler`]s and runs background
//! loops while connected. [`ChattingAgent`] builds on it: it streams replies
//! from a language model, speaks them sentence by sentence and can be
//! interrupted by the next user input.

pub mod chatting;
pub mod config;
pub mod error;
pub mod runtime;

pub use chatting::{ChattingAgent, INTERRUPTED_MARKER};
pub use config::{AgentConfig, VoiceConfig};
pub use error::AgentError;
pub use runtime::{normalize_server_url, Agent, AgentContext, Handler, InboundEvent};

use silicon_stream::SentenceSepNode;
use silicon_types::voice::VoiceProfile;
use silicon_voice::{Silent, Speaker, Synthesizer, TtsService, VoiceError};
use std::sync::Arc;

/// Builds a ready-to-run agent of `config.agent_type`.
///
/// Registered types: `basic_chatting` (alias `basic_chatting_agent`).
///
/// # Errors
///
/// [`AgentError::UnknownAgentType`] for an unregistered type, plus bot or
/// voice configuration errors.
pub async fn create_agent(config: &AgentConfig) -> Result<Agent, AgentError> {
    match config.agent_type.as_str() {
        "basic_chatting" | "basic_chatting_agent" => {
            let bot = silicon_bot::create_bot(config.bot.clone())?;
            let synthesizer = create_synthesizer(&config.voice, &config.agent_name).await?;
            let splitter =
                SentenceSepNode::new(&config.stream.separators, config.stream.keep_separators);

            let chatting = ChattingAgent::with_splitter(bot, synthesizer, splitter);
            let mut agent = Agent::new(&config.server_url, config.agent_name.clone());
            chatting.install(&mut agent);
            Ok(agent)
        }
        other => Err(AgentError::UnknownAgentType(other.to_string())),
    }
}

/// Builds the synthesizer for `voice`, or [`Silent`] when voice is off.
///
/// # Errors
///
/// [`VoiceError::Config`] if the profile's speed is out of range.
pub async fn create_synthesizer(
    voice: &VoiceConfig,
    agent_name: &str,
) -> Result<Arc<dyn Synthesizer>, VoiceError> {
    if !voice.enabled {
        tracing::info!(agent_name, "voice disabled, say_aloud events carry no audio");
        return Ok(Arc::new(Silent));
    }

    let mut profile = voice.profile.clone().unwrap_or_else(|| VoiceProfile {
        id: agent_name.to_string(),
        ..VoiceProfile::default()
    });
    if profile.id.trim().is_empty() {
        profile.id = agent_name.to_string();
    }
    if !(0.1..=10.0).contains(&profile.speed) {
        return Err(VoiceError::Config(
            "Speed must be between 0.1 and 10.0".to_string(),
        ));
    }

    let service = TtsService::new(&voice.voices_dir, &voice.piper_binary)
        .with_espeak_binary(&voice.espeak_binary);
    let profile_id = profile.id.clone();
    tracing::info!(
        agent_name,
        profile_id = %profile_id,
        model = ?profile.model,
        "voice enabled"
    );
    service.add_profile(profile).await;
    Ok(Arc::new(Speaker::new(service, profile_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_agent_type_is_rejected() {
        let config = AgentConfig {
            agent_type: "dancing".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_agent(&config).await,
            Err(AgentError::UnknownAgentType(t)) if t == "dancing"
        ));
    }

    #[tokio::test]
    async fn basic_chatting_agent_is_built() {
        let config = AgentConfig {
            server_url: "http://relay.local:8000/".to_string(),
            agent_name: "mio".to_string(),
            ..Default::default()
        };
        let agent = create_agent(&config).await.unwrap();
        assert_eq!(agent.endpoint(), "ws://relay.local:8000/ws/agent/mio");
    }

    #[tokio::test]
    async fn voice_profile_defaults_to_agent_name() {
        let voice = VoiceConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(create_synthesizer(&voice, "mio").await.is_ok());

        let mut bad = voice.clone();
        bad.profile = Some(VoiceProfile {
            id: String::new(),
            speed: 0.0,
            ..VoiceProfile::default()
        });
        assert!(matches!(
            create_synthesizer(&bad, "mio").await,
            Err(VoiceError::Config(_))
        ));
    }
}
