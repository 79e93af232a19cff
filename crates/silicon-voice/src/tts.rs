use crate::error::VoiceError;
use crate::wav::{is_wav, pcm16_to_wav};
use silicon_types::voice::{VoiceModel, VoiceProfile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::RwLock;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for TTS process execution.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Service for generating speech from text.
///
/// Every engine result is returned as a WAV file so callers can ship it to a
/// browser without knowing the engine's raw format.
#[derive(Debug, Clone)]
pub struct TtsService {
    profiles: Arc<RwLock<HashMap<String, VoiceProfile>>>,
    voices_dir: PathBuf,
    piper_binary: PathBuf,
    espeak_binary: PathBuf,
}

impl TtsService {
    /// Creates a new `TtsService` with the given voices directory and piper
    /// binary path.
    pub fn new(voices_dir: impl AsRef<Path>, piper_binary: impl AsRef<Path>) -> Self {
        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
            voices_dir: voices_dir.as_ref().to_path_buf(),
            piper_binary: piper_binary.as_ref().to_path_buf(),
            espeak_binary: PathBuf::from("espeak-ng"),
        }
    }

    /// Overrides the `espeak-ng` executable used for system voices.
    pub fn with_espeak_binary(mut self, espeak_binary: impl AsRef<Path>) -> Self {
        self.espeak_binary = espeak_binary.as_ref().to_path_buf();
        self
    }

    /// Adds (or replaces) a voice profile.
    pub async fn add_profile(&self, profile: VoiceProfile) {
        tracing::debug!(profile_id = %profile.id, model = ?profile.model, "registered voice profile");
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }

    /// Retrieves a voice profile by ID.
    pub async fn get_profile(&self, id: &str) -> Option<VoiceProfile> {
        self.profiles.read().await.get(id).cloned()
    }

    /// Synthesizes speech from the given text using the specified profile.
    ///
    /// Returns a complete WAV file.
    pub async fn synthesize(&self, text: &str, profile_id: &str) -> Result<Vec<u8>, VoiceError> {
        let profile = self
            .get_profile(profile_id)
            .await
            .ok_or_else(|| VoiceError::ProfileNotFound(profile_id.to_string()))?;

        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        match profile.model {
            VoiceModel::Piper => self.synthesize_piper(text, &profile).await,
            VoiceModel::System => self.synthesize_system(text, &profile).await,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.voices_dir.join(path)
        }
    }

    async fn synthesize_piper(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<Vec<u8>, VoiceError> {
        let model_path = self.resolve(&profile.model_path);
        if !model_path.exists() {
            return Err(VoiceError::Tts(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }
        if !(0.1..=10.0).contains(&profile.speed) {
            return Err(VoiceError::Config(
                "Speed must be between 0.1 and 10.0".to_string(),
            ));
        }

        let mut command = Command::new(&self.piper_binary);
        // Piper's length scale is the inverse of speed.
        command
            .arg("--model")
            .arg(model_path)
            .arg("--output_raw")
            .arg("--length_scale")
            .arg((1.0 / profile.speed).to_string());
        if let Some(config) = &profile.config_path {
            command.arg("--config").arg(self.resolve(config));
        }
        if let Some(speaker) = profile.speaker_id {
            command.arg("--speaker").arg(speaker.to_string());
        }

        let pcm = run_engine(command, "piper", text).await?;
        Ok(pcm16_to_wav(&pcm, profile.sample_rate))
    }

    /// `espeak-ng --stdout` already writes WAV; anything else is treated as
    /// raw PCM.
    async fn synthesize_system(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<Vec<u8>, VoiceError> {
        let mut command = Command::new(&self.espeak_binary);
        command.arg("--stdout").arg("--stdin");
        if let Some(language) = &profile.language {
            command.arg("-v").arg(language);
        }
        // espeak-ng's default rate is 175 words per minute.
        let rate = (175.0 * profile.speed).round().clamp(80.0, 450.0) as u32;
        command.arg("-s").arg(rate.to_string());

        let audio = run_engine(command, "espeak-ng", text).await?;
        if is_wav(&audio) {
            Ok(audio)
        } else {
            Ok(pcm16_to_wav(&audio, profile.sample_rate))
        }
    }
}

/// Runs one engine process with `text` on stdin and returns its stdout.
///
/// The child is killed when this future is dropped, so aborting the task
/// that awaits a synthesis also ends the engine.
async fn run_engine(mut command: Command, engine: &str, text: &str) -> Result<Vec<u8>, VoiceError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| VoiceError::Tts(format!("Failed to spawn {}: {}", engine, e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| VoiceError::Tts(format!("{} has no stdin", engine)))?;
    let input = text.as_bytes().to_vec();

    // Feed stdin concurrently with reading stdout; the pipe buffer is finite.
    let feed = async move {
        match stdin.write_all(&input).await {
            // The engine may exit without reading all of its input.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            result => result,
        }
    };
    let run = async { tokio::try_join!(feed, child.wait_with_output()) };

    let (_, output) = tokio::time::timeout(TTS_TIMEOUT, run)
        .await
        .map_err(|_| {
            VoiceError::Tts(format!(
                "{} timed out after {} seconds",
                engine,
                TTS_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| VoiceError::Tts(format!("{} I/O failed: {}", engine, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoiceError::Tts(format!("{} failed: {}", engine, stderr.trim())));
    }
    Ok(output.stdout)
}
