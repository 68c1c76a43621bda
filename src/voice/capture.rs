//! Microphone capture and one-shot recognition sessions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::{mpsc, oneshot};

use crate::interaction::{Event, RecognitionResult};
use crate::voice::{CaptureAdapter, SpeechToText};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Minimum RMS energy to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length for a usable utterance (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.5s)
const TRAILING_SILENCE_SAMPLES: usize = 8000;

/// Silence budget before a session gives up with no speech (8s)
const NO_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 8;

/// How often the session thread drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing into the shared buffer
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take the samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Copy the captured samples without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the capture buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }
}

/// Verdict after feeding a chunk of samples to the endpointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    /// Keep capturing
    Continue,
    /// A complete utterance was captured
    Complete,
    /// The session timed out without usable speech
    NoSpeech,
}

/// Segments one utterance out of the capture stream by RMS energy.
///
/// A session completes once enough speech has been heard followed by trailing
/// silence, and gives up after a long stretch with no speech at all.
#[derive(Debug, Default)]
pub struct Endpointer {
    speech: Vec<f32>,
    heard_speech: bool,
    silence_run: usize,
    idle_run: usize,
}

impl Endpointer {
    /// Create an endpointer for a fresh session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed captured samples; returns whether the session should continue
    pub fn push(&mut self, samples: &[f32]) -> SessionVerdict {
        let is_speech = calculate_rms(samples) > ENERGY_THRESHOLD;

        if self.heard_speech {
            self.speech.extend_from_slice(samples);
            if is_speech {
                self.silence_run = 0;
            } else {
                self.silence_run += samples.len();
            }

            if self.silence_run > TRAILING_SILENCE_SAMPLES {
                return if self.speech.len() > MIN_SPEECH_SAMPLES {
                    SessionVerdict::Complete
                } else {
                    SessionVerdict::NoSpeech
                };
            }
        } else if is_speech {
            self.heard_speech = true;
            self.speech.extend_from_slice(samples);
        } else {
            self.idle_run += samples.len();
            if self.idle_run > NO_SPEECH_SAMPLES {
                return SessionVerdict::NoSpeech;
            }
        }

        SessionVerdict::Continue
    }

    /// Take the captured utterance samples
    pub fn take_speech(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech)
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub(crate) fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert f32 samples to WAV bytes for the STT API
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// The real speech capture adapter: microphone + endpointer + STT.
///
/// Each session runs on its own thread (cpal streams are not `Send`), then
/// hands the utterance to an async task for transcription. Exactly one
/// `Recognized` is emitted per successful session, followed by
/// `ListeningStopped`.
pub struct MicCapture {
    stt: Arc<SpeechToText>,
    events: mpsc::UnboundedSender<Event>,
    active: Arc<AtomicBool>,
    stop_flag: Mutex<Option<Arc<AtomicBool>>>,
}

impl MicCapture {
    /// Create the capture adapter
    #[must_use]
    pub fn new(stt: Arc<SpeechToText>, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            stt,
            events,
            active: Arc::new(AtomicBool::new(false)),
            stop_flag: Mutex::new(None),
        }
    }

    /// Verify an input device exists before running.
    ///
    /// Capability absence is fatal-to-feature; the caller reports it once at
    /// startup instead of failing on the first session.
    ///
    /// # Errors
    ///
    /// Returns error if no input device is available
    pub fn probe() -> Result<()> {
        AudioCapture::new().map(|_| ())
    }
}

#[async_trait]
impl CaptureAdapter for MicCapture {
    async fn start(&self) -> Result<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("capture already active, ignoring start");
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        if let Ok(mut guard) = self.stop_flag.lock() {
            *guard = Some(Arc::clone(&stop));
        }

        let (done_tx, done_rx) = oneshot::channel::<Option<Vec<f32>>>();
        let session_events = self.events.clone();
        std::thread::spawn(move || {
            let outcome = run_session(&session_events, &stop);
            let _ = done_tx.send(outcome);
        });

        let events = self.events.clone();
        let stt = Arc::clone(&self.stt);
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            if let Some(samples) = done_rx.await.ok().flatten() {
                transcribe_and_emit(&stt, &samples, &events).await;
            }
            active.store(false, Ordering::SeqCst);
            let _ = events.send(Event::ListeningStopped);
        });

        Ok(())
    }

    fn stop(&self) {
        if let Ok(guard) = self.stop_flag.lock() {
            if let Some(flag) = guard.as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

/// Run one capture session to completion; returns the utterance samples, or
/// `None` when stopped early or no speech was heard
fn run_session(
    events: &mpsc::UnboundedSender<Event>,
    stop: &AtomicBool,
) -> Option<Vec<f32>> {
    let mut capture = match AudioCapture::new() {
        Ok(capture) => capture,
        Err(e) => {
            tracing::error!(error = %e, "could not open capture device");
            return None;
        }
    };
    if let Err(e) = capture.start() {
        tracing::error!(error = %e, "could not start capture");
        return None;
    }

    let _ = events.send(Event::ListeningStarted);

    let mut endpointer = Endpointer::new();
    loop {
        if stop.load(Ordering::SeqCst) {
            capture.stop();
            return None;
        }

        std::thread::sleep(POLL_INTERVAL);
        let chunk = capture.take_buffer();

        match endpointer.push(&chunk) {
            SessionVerdict::Continue => {}
            SessionVerdict::Complete => {
                capture.stop();
                return Some(endpointer.take_speech());
            }
            SessionVerdict::NoSpeech => {
                capture.stop();
                tracing::debug!("session ended without speech");
                return None;
            }
        }
    }
}

/// Transcribe an utterance and emit `Recognized` when it yields text
async fn transcribe_and_emit(
    stt: &SpeechToText,
    samples: &[f32],
    events: &mpsc::UnboundedSender<Event>,
) {
    let wav = match samples_to_wav(samples, SAMPLE_RATE) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::warn!(error = %e, "wav encoding failed");
            return;
        }
    };

    match stt.transcribe(&wav).await {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                tracing::debug!("transcription was empty");
            } else {
                let _ = events.send(Event::Recognized(RecognitionResult::new(text)));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "transcription failed");
        }
    }
}
