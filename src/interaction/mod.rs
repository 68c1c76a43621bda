//! Interaction core
//!
//! The voice-interaction state machine and its pure collaborators: the local
//! command interpreter and the canned reaction picker. Everything here runs
//! without audio hardware or a network.

mod interpreter;
mod machine;
mod reaction;
mod types;

pub use interpreter::{interpret, Interpretation};
pub use machine::{Action, Event, Machine};
pub use reaction::{ReactionPicker, CANNED_REPLIES};
pub use types::{
    FaceView, InteractionMode, PendingRequest, RecognitionResult, Side, Utterance,
    UtteranceSource,
};
