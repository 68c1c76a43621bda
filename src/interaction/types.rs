//! Core value types for the interaction loop

use chrono::{DateTime, Local};
use serde::Serialize;

/// The single interaction mode; exactly one is active at a time.
///
/// Transitions are owned by the state machine and are the only way
/// microphone/playback conflicts are avoided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Nothing active; waiting for a trigger
    Idle,
    /// Capture session active or a recognized utterance being processed
    Listening,
    /// An utterance is audible
    Speaking,
}

/// Where a spoken utterance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceSource {
    /// Answered locally (time/date/owner)
    LocalCommand,
    /// Reply from the remote responder
    RemoteReply,
    /// Canned cheek-touch reaction
    CannedReaction,
    /// Fixed sentence covering a failure
    ErrorReply,
}

/// A single unit of synthesized speech, consumed exactly once by playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Text to synthesize
    pub text: String,

    /// Origin of the text
    pub source: UtteranceSource,
}

impl Utterance {
    /// Create an utterance
    #[must_use]
    pub fn new(text: impl Into<String>, source: UtteranceSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// One recognized text result, produced at most once per capture session
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Recognized text, trimmed
    pub text: String,

    /// When recognition completed
    pub timestamp: DateTime<Local>,
}

impl RecognitionResult {
    /// Create a result stamped with the current local time
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

/// The single in-flight remote request, if any
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Text forwarded to the remote responder
    pub query_text: String,

    /// When the request was dispatched
    pub started_at: DateTime<Local>,

    /// Interaction generation the reply must match to be spoken
    pub generation: u64,
}

/// Cheek side for reaction triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left cheek
    Left,
    /// Right cheek
    Right,
}

impl Side {
    /// Index into per-side state arrays
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// Read-only projection of the interaction state for the visual layer.
///
/// Pure output; nothing feeds back into the state machine through it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FaceView {
    /// Capture session active (drives the eyes)
    pub is_listening: bool,

    /// An utterance is audible (drives the mouth)
    pub mouth_open: bool,

    /// Left cheek blush active
    pub blush_left: bool,

    /// Right cheek blush active
    pub blush_right: bool,

    /// Most recently recognized text, if any
    pub transcript: Option<String>,
}
