//! Visage - animated voice-assistant face daemon
//!
//! Listens to microphone speech, answers a small set of local commands,
//! forwards everything else to a remote chat backend, and speaks the result
//! aloud while publishing the face-animation flags a front-end renders.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 HTTP triggers / view              │
//! │     POST /api/listen  │  POST /api/react/{side}  │
//! └───────────────────────┬──────────────────────────┘
//!                         │ events
//! ┌───────────────────────▼──────────────────────────┐
//! │           Interaction state machine               │
//! │        Idle  │  Listening  │  Speaking           │
//! └──────┬──────────────┬───────────────┬────────────┘
//!        │              │               │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌──────▼───────────┐
//! │ Mic + STT   │ │ Remote     │ │ TTS + speaker    │
//! │ (capture)   │ │ responder  │ │ (playback)       │
//! └─────────────┘ └────────────┘ └──────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod face;
pub mod interaction;
pub mod responder;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use face::{Face, FaceHandle};
pub use interaction::{
    Action, Event, FaceView, InteractionMode, Machine, RecognitionResult, Side, Utterance,
    UtteranceSource,
};
pub use responder::{ResponderClient, ERROR_REPLY, FALLBACK_REPLY};
