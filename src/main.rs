use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use visage::voice::{
    AudioPlayback, CaptureAdapter, MicCapture, PlaybackAdapter, Speaker, SpeechToText,
    TextToSpeech, SAMPLE_RATE,
};
use visage::{Config, Face};

/// Visage - animated voice-assistant face daemon
#[derive(Parser)]
#[command(name = "visage", version, about)]
struct Cli {
    /// Port for the face view / trigger API
    #[arg(long, env = "VISAGE_PORT", default_value = "18920")]
    port: u16,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Start listening immediately instead of waiting for a trigger
    #[arg(long)]
    listen_on_start: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Synthesize and play a sentence
    TestVoice {
        /// Text to speak
        #[arg(default_value = "Hello! I am your visage assistant.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,visage=info",
        1 => "info,visage=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestVoice { text } => test_voice(&config, &text).await,
        };
    }

    tracing::info!(
        endpoint = %config.chat_endpoint,
        language = %config.language,
        port = cli.port,
        "starting visage"
    );

    // Capability absence is fatal: without devices and keys the face cannot
    // operate, so report once at startup instead of limping along silently.
    MicCapture::probe()
        .map_err(|e| anyhow::anyhow!("speech capture unavailable: {e}"))?;
    Speaker::probe()
        .map_err(|e| anyhow::anyhow!("speech playback unavailable: {e}"))?;

    let stt = SpeechToText::new(
        config.api_keys.openai.clone().unwrap_or_default(),
        config.voice.stt_model.clone(),
        config.stt_language().to_string(),
    )?;

    let mut tts = TextToSpeech::new(
        config.api_keys.elevenlabs.clone().unwrap_or_default(),
        config.voice.tts_voice.clone(),
        config.voice.tts_model.clone(),
    )?;
    tts.pick_voice().await;

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let capture: Arc<dyn CaptureAdapter> =
        Arc::new(MicCapture::new(Arc::new(stt), events_tx.clone()));
    let playback: Arc<dyn PlaybackAdapter> =
        Arc::new(Speaker::new(Arc::new(tts), events_tx.clone()));

    let face = Face::new(&config, capture, playback, events_tx, events_rx);
    let handle = face.handle();

    if cli.listen_on_start {
        handle.send(visage::Event::StartRequested);
    }

    let api = tokio::spawn(visage::api::serve(handle, cli.port));
    let face_task = tokio::spawn(face.run());

    tokio::select! {
        result = api => result?.map_err(Into::into),
        _ = face_task => Ok(()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = visage::voice::AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2.0) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    let cancel = std::sync::atomic::AtomicBool::new(false);
    tokio::task::block_in_place(|| playback.play(samples, &cancel))?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Synthesize and play a sentence end to end
async fn test_voice(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Synthesizing: \"{text}\"\n");

    let mut tts = TextToSpeech::new(
        config.api_keys.elevenlabs.clone().unwrap_or_default(),
        config.voice.tts_voice.clone(),
        config.voice.tts_model.clone(),
    )?;
    tts.pick_voice().await;
    println!("Voice: {}", tts.voice_id());

    let mp3 = tts.synthesize(text).await?;
    println!("Got {} bytes of audio", mp3.len());

    let samples = visage::voice::decode_mp3(&mp3)?;
    let playback = AudioPlayback::new()?;
    let cancel = std::sync::atomic::AtomicBool::new(false);
    tokio::task::block_in_place(|| playback.play(samples, &cancel))?;

    println!("\n---");
    println!("If you heard the speech, voice output is working!");

    Ok(())
}
