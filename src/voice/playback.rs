//! Speaker playback with cancellation

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::mpsc;

use crate::interaction::Event;
use crate::voice::{PlaybackAdapter, TextToSpeech};
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays audio to the default output device
pub struct AudioPlayback {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play samples to completion, or until `cancel` is set.
    ///
    /// Blocking; run off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn play(&self, samples: Vec<f32>, cancel: &AtomicBool) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = usize::from(config.channels);

        let sample_count = samples.len();
        let shared = Arc::new(Mutex::new((samples, 0usize)));
        let finished = Arc::new(AtomicBool::new(false));

        let shared_clone = Arc::clone(&shared);
        let finished_clone = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut guard) = shared_clone.lock() else {
                        return;
                    };
                    let (samples, pos) = &mut *guard;

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples.len() {
                            let s = samples[*pos];
                            *pos += 1;
                            s
                        } else {
                            finished_clone.store(true, Ordering::SeqCst);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline = std::time::Instant::now() + Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::SeqCst) && !cancel.load(Ordering::SeqCst) {
            if std::time::Instant::now() > deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        drop(stream);
        if cancel.load(Ordering::SeqCst) {
            tracing::debug!("playback cancelled");
        } else {
            tracing::debug!(samples = sample_count, "playback complete");
        }

        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the MP3 data is malformed
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// The real speech playback adapter: TTS synthesis + cancellable playback.
///
/// A new `speak` sets the previous utterance's cancel flag before starting,
/// so at most one utterance is ever audible. Every `speak` eventually emits
/// `SpeechEnded` for its id, including the synthesis-failure and cancelled
/// paths, so the interaction loop never hangs waiting on playback.
pub struct Speaker {
    tts: Arc<TextToSpeech>,
    events: mpsc::UnboundedSender<Event>,
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl Speaker {
    /// Create the playback adapter
    #[must_use]
    pub fn new(tts: Arc<TextToSpeech>, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            tts,
            events,
            current_cancel: Mutex::new(None),
        }
    }

    /// Verify an output device exists before running
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn probe() -> Result<()> {
        AudioPlayback::new().map(|_| ())
    }
}

#[async_trait]
impl PlaybackAdapter for Speaker {
    async fn speak(&self, id: u64, text: &str) -> Result<()> {
        // The most recent speak call wins.
        self.cancel();

        let cancel = Arc::new(AtomicBool::new(false));
        if let Ok(mut guard) = self.current_cancel.lock() {
            *guard = Some(Arc::clone(&cancel));
        }

        let tts = Arc::clone(&self.tts);
        let events = self.events.clone();
        let text = text.to_string();

        tokio::spawn(async move {
            let samples = match tts.synthesize(&text).await.and_then(|mp3| decode_mp3(&mp3)) {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::error!(error = %e, "synthesis failed");
                    let _ = events.send(Event::SpeechEnded { id });
                    return;
                }
            };

            if cancel.load(Ordering::SeqCst) {
                let _ = events.send(Event::SpeechEnded { id });
                return;
            }

            let _ = events.send(Event::SpeechStarted { id });

            let play_result = tokio::task::spawn_blocking(move || {
                let playback = AudioPlayback::new()?;
                playback.play(samples, &cancel)
            })
            .await;

            match play_result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "playback failed"),
                Err(e) => tracing::error!(error = %e, "playback task panicked"),
            }

            let _ = events.send(Event::SpeechEnded { id });
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Ok(guard) = self.current_cancel.lock() {
            if let Some(flag) = guard.as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}
