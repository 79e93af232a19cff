//! Voice synthesis for Silicon agents.
//!
//! Agents speak one sentence at a time: every text segment coming out of the
//! stream pipeline is handed to a [`Synthesizer`] and the resulting WAV bytes
//! travel to the frontend base64-encoded inside a `say_aloud` event.
//!
//! [`TtsService`] drives local TTS engines as subprocesses (Piper, or
//! `espeak-ng` as the system fallback) and keeps a table of named
//! [`VoiceProfile`](silicon_types::voice::VoiceProfile)s. A [`Speaker`] binds
//! the service to one profile. [`Silent`] is used when voice output is off.

pub mod error;
pub mod speaker;
pub mod tts;
pub mod wav;

pub use error::VoiceError;
pub use speaker::{encode_audio, Silent, Speaker, Synthesizer};
pub use tts::TtsService;
