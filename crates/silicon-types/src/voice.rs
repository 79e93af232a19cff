//! Voice profile and engine definitions.
//!
//! A `VoiceProfile` maps a speaker name to a TTS engine and its parameters.
//! Agents are usually given a profile named after themselves.

use serde::{Deserialize, Serialize};

/// Supported TTS engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceModel {
    /// Piper TTS (ONNX-based, fast, local).
    #[default]
    Piper,
    /// System TTS via `espeak-ng`.
    System,
}

/// A voice profile configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Unique identifier for the voice profile (usually the agent name).
    pub id: String,
    /// The underlying TTS engine.
    #[serde(default)]
    pub model: VoiceModel,
    /// Path to the model file (relative to the voices directory or absolute).
    #[serde(default)]
    pub model_path: String,
    /// Path to the model configuration file (if applicable).
    #[serde(default)]
    pub config_path: Option<String>,
    /// Speech speed multiplier (1.0 is normal).
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Speaker ID within a multi-speaker model (0-indexed).
    #[serde(default)]
    pub speaker_id: Option<u32>,
    /// Sample rate of the raw PCM the engine produces.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Voice/language passed to engines that take one (e.g. `espeak-ng -v zh`).
    #[serde(default)]
    pub language: Option<String>,
}

fn default_speed() -> f32 {
    1.0
}

fn default_sample_rate() -> u32 {
    22_050
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            model: VoiceModel::Piper,
            model_path: "en_US-lessac-medium.onnx".to_string(),
            config_path: Some("en_US-lessac-medium.onnx.json".to_string()),
            speed: default_speed(),
            speaker_id: None,
            sample_rate: default_sample_rate(),
            language: None,
        }
    }
}
