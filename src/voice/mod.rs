//! Voice adapters
//!
//! Microphone capture + STT form the speech capture adapter; TTS + speaker
//! playback form the speech playback adapter. The interaction driver talks to
//! both through trait seams so tests substitute fakes that fire events
//! synchronously.

mod capture;
mod playback;
mod stt;
mod tts;

use async_trait::async_trait;

pub use capture::{samples_to_wav, AudioCapture, Endpointer, MicCapture, SessionVerdict, SAMPLE_RATE};
pub use playback::{decode_mp3, AudioPlayback, Speaker};
pub use stt::SpeechToText;
pub use tts::{select_preferred_voice, TextToSpeech, Voice};

use crate::Result;

/// Speech capture adapter: one-shot recognition sessions
#[async_trait]
pub trait CaptureAdapter: Send + Sync {
    /// Begin a single-shot capture session.
    ///
    /// Silent no-op when a session is already active. A session fires
    /// `ListeningStarted`, at most one `Recognized`, then `ListeningStopped`
    /// on the event channel.
    async fn start(&self) -> Result<()>;

    /// End any active session immediately; idempotent when already stopped
    fn stop(&self);
}

/// Speech playback adapter: at most one utterance audible at any time
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Queue exactly one utterance, cancelling any still-playing one first.
    ///
    /// Fires `SpeechStarted { id }` when audio begins and `SpeechEnded { id }`
    /// when it finishes, is cancelled, or fails.
    async fn speak(&self, id: u64, text: &str) -> Result<()>;

    /// Cancel any in-flight utterance
    fn cancel(&self);
}
