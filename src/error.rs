//! Error types for the visage daemon

use thiserror::Error;

/// Result type alias for visage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the visage daemon
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// HTTP API server error
    #[error("api error: {0}")]
    Api(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
