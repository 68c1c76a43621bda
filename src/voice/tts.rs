//! Text-to-speech via ElevenLabs, with voice preference

use crate::{Error, Result};

/// Case-insensitive tokens that mark a preferred voice name
const PREFERRED_VOICE_TOKENS: [&str; 3] = ["female", "woman", "samantha"];

/// One voice advertised by the TTS provider
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Voice {
    /// Provider voice identifier
    pub voice_id: String,
    /// Human-readable voice name
    pub name: String,
}

#[derive(serde::Deserialize)]
struct VoicesResponse {
    voices: Vec<Voice>,
}

#[derive(serde::Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    model: String,
}

impl TextToSpeech {
    /// Create a new TTS instance with the fallback voice
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id,
            model,
        })
    }

    /// The voice currently in use
    #[must_use]
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// List the voices available to this account
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    pub async fn list_voices(&self) -> Result<Vec<Voice>> {
        let response = self
            .client
            .get("https://api.elevenlabs.io/v1/voices")
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("voice listing error {status}: {body}")));
        }

        let result: VoicesResponse = response.json().await?;
        Ok(result.voices)
    }

    /// Switch to a preferred voice when one is available.
    ///
    /// Best effort: a missing match or a failed listing keeps the configured
    /// fallback voice and is never an error.
    pub async fn pick_voice(&mut self) {
        match self.list_voices().await {
            Ok(voices) => {
                if let Some(voice) = select_preferred_voice(&voices) {
                    tracing::info!(voice = %voice.name, "preferred voice selected");
                    self.voice_id = voice.voice_id.clone();
                } else {
                    tracing::debug!("no preferred voice available, keeping default");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "voice listing failed, keeping default");
            }
        }
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );

        let request = SynthesisRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Pick the first voice whose name contains a preferred token,
/// case-insensitive
#[must_use]
pub fn select_preferred_voice(voices: &[Voice]) -> Option<&Voice> {
    voices.iter().find(|v| {
        let name = v.name.to_lowercase();
        PREFERRED_VOICE_TOKENS
            .iter()
            .any(|token| name.contains(token))
    })
}
