//! Configuration management for the visage daemon

use std::time::Duration;

use url::Url;

use crate::{Error, Result};

/// Default remote responder endpoint
const DEFAULT_CHAT_ENDPOINT: &str = "http://localhost:5000/api/chat";

/// Default settle delay between stopping a session and restarting capture
const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Default blush duration after a cheek touch
const DEFAULT_BLUSH_DURATION_MS: u64 = 1500;

/// Visage daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote responder chat endpoint
    pub chat_endpoint: Url,

    /// Owner identity spoken by the "owner" command
    pub owner_name: String,

    /// Recognition locale (e.g. "en-US"); fixed for the process lifetime
    pub language: String,

    /// Delay between stopping any session and starting a new capture.
    /// Restarting capture immediately after a stop is unreliable on the
    /// underlying audio stack.
    pub settle_delay: Duration,

    /// How long a cheek-touch blush stays visible
    pub blush_duration: Duration,

    /// Optional seed for deterministic canned reaction replies
    pub reaction_seed: Option<u64>,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "`eleven_monolingual_v1`")
    pub tts_model: String,

    /// Fallback TTS voice id when no preferred voice is available
    pub tts_voice: String,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (for Whisper STT)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (for TTS and voice listing)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns error if the chat endpoint is not a valid URL
    pub fn load() -> Result<Self> {
        let endpoint = std::env::var("VISAGE_CHAT_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_CHAT_ENDPOINT.to_string());
        let chat_endpoint = Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("invalid chat endpoint {endpoint:?}: {e}")))?;

        let owner_name =
            std::env::var("VISAGE_OWNER_NAME").unwrap_or_else(|_| "my maker".to_string());

        let language = std::env::var("VISAGE_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        let settle_delay = Duration::from_millis(
            std::env::var("VISAGE_SETTLE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        );

        let blush_duration = Duration::from_millis(
            std::env::var("VISAGE_BLUSH_DURATION_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BLUSH_DURATION_MS),
        );

        let reaction_seed = std::env::var("VISAGE_REACTION_SEED")
            .ok()
            .and_then(|s| s.parse().ok());

        let voice = VoiceConfig {
            stt_model: std::env::var("VISAGE_STT_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            tts_model: std::env::var("VISAGE_TTS_MODEL")
                .unwrap_or_else(|_| "eleven_monolingual_v1".to_string()),
            tts_voice: std::env::var("VISAGE_TTS_VOICE")
                .unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string()),
        };

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok(),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY").ok(),
        };

        Ok(Self {
            chat_endpoint,
            owner_name,
            language,
            settle_delay,
            blush_duration,
            reaction_seed,
            voice,
            api_keys,
        })
    }

    /// Two-letter STT language code derived from the configured locale
    #[must_use]
    pub fn stt_language(&self) -> &str {
        self.language.split('-').next().unwrap_or("en")
    }
}
