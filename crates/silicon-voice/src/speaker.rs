use crate::error::VoiceError;
use crate::tts::TtsService;
use async_trait::async_trait;
use base64::Engine as _;

/// Turns one finished sentence into audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError>;
}

/// A [`TtsService`] bound to one voice profile.
#[derive(Debug, Clone)]
pub struct Speaker {
    service: TtsService,
    profile_id: String,
}

impl Speaker {
    pub fn new(service: TtsService, profile_id: impl Into<String>) -> Self {
        Self {
            service,
            profile_id: profile_id.into(),
        }
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }
}

#[async_trait]
impl Synthesizer for Speaker {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        self.service.synthesize(text, &self.profile_id).await
    }
}

/// Produces no audio; used when voice output is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

#[async_trait]
impl Synthesizer for Silent {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, VoiceError> {
        Ok(Vec::new())
    }
}

/// Encodes audio for the `media_data` field of a `say_aloud` event.
pub fn encode_audio(audio: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(audio)
}
