//! Shared test fakes for the voice adapters
//!
//! The fakes fire the same events the real adapters fire, synchronously and
//! under test control, and record every adapter call so tests can assert
//! call ordering without audio hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use visage::voice::{CaptureAdapter, PlaybackAdapter};
use visage::{Config, Event, Face, FaceHandle, Result};

/// Watches that capture and playback are never simultaneously active
pub struct Monitor {
    capture: AtomicBool,
    playback: AtomicBool,
    violation: AtomicBool,
}

impl Monitor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            capture: AtomicBool::new(false),
            playback: AtomicBool::new(false),
            violation: AtomicBool::new(false),
        })
    }

    fn set_capture(&self, active: bool) {
        self.capture.store(active, Ordering::SeqCst);
        self.check();
    }

    fn set_playback(&self, active: bool) {
        self.playback.store(active, Ordering::SeqCst);
        self.check();
    }

    fn check(&self) {
        if self.capture.load(Ordering::SeqCst) && self.playback.load(Ordering::SeqCst) {
            self.violation.store(true, Ordering::SeqCst);
        }
    }

    /// Whether capture and playback ever overlapped
    pub fn violated(&self) -> bool {
        self.violation.load(Ordering::SeqCst)
    }
}

/// Fake capture adapter: a started session stays open until stopped; tests
/// inject `Recognized` events themselves
pub struct FakeCapture {
    events: mpsc::UnboundedSender<Event>,
    active: AtomicBool,
    log: Arc<Mutex<Vec<String>>>,
    monitor: Arc<Monitor>,
}

#[async_trait]
impl CaptureAdapter for FakeCapture {
    async fn start(&self) -> Result<()> {
        self.log.lock().unwrap().push("capture.start".to_string());
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.monitor.set_capture(true);
        let _ = self.events.send(Event::ListeningStarted);
        Ok(())
    }

    fn stop(&self) {
        self.log.lock().unwrap().push("capture.stop".to_string());
        if self.active.swap(false, Ordering::SeqCst) {
            self.monitor.set_capture(false);
            let _ = self.events.send(Event::ListeningStopped);
        }
    }
}

/// Fake playback adapter. With `hold` set, an utterance stays audible until
/// [`FakePlayback::finish_current`]; otherwise it ends immediately.
pub struct FakePlayback {
    events: mpsc::UnboundedSender<Event>,
    playing: Mutex<Option<u64>>,
    hold: bool,
    log: Arc<Mutex<Vec<String>>>,
    monitor: Arc<Monitor>,
}

impl FakePlayback {
    /// End the currently audible utterance, as real playback completion would
    pub fn finish_current(&self) {
        if let Some(id) = self.playing.lock().unwrap().take() {
            self.monitor.set_playback(false);
            let _ = self.events.send(Event::SpeechEnded { id });
        }
    }
}

#[async_trait]
impl PlaybackAdapter for FakePlayback {
    async fn speak(&self, id: u64, text: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("speak:{text}"));

        // At most one utterance audible: replace whatever is playing.
        let previous = self.playing.lock().unwrap().replace(id);
        if let Some(old) = previous {
            let _ = self.events.send(Event::SpeechEnded { id: old });
        }

        self.monitor.set_playback(true);
        let _ = self.events.send(Event::SpeechStarted { id });

        if !self.hold {
            self.playing.lock().unwrap().take();
            self.monitor.set_playback(false);
            let _ = self.events.send(Event::SpeechEnded { id });
        }
        Ok(())
    }

    fn cancel(&self) {
        self.log.lock().unwrap().push("playback.cancel".to_string());
        if let Some(id) = self.playing.lock().unwrap().take() {
            self.monitor.set_playback(false);
            let _ = self.events.send(Event::SpeechEnded { id });
        }
    }
}

/// A running face with fake adapters
pub struct Harness {
    pub handle: FaceHandle,
    pub log: Arc<Mutex<Vec<String>>>,
    pub monitor: Arc<Monitor>,
    pub playback: Arc<FakePlayback>,
}

impl Harness {
    /// All `speak` calls so far, in order
    pub fn spoken(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| entry.strip_prefix("speak:").map(ToString::to_string))
            .collect()
    }

    /// The full adapter call log so far
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// Test configuration with a fixed owner and seeded reactions
pub fn test_config() -> Config {
    let mut config = Config::load().expect("default config loads");
    config.owner_name = "Ada".to_string();
    config.reaction_seed = Some(1);
    config
}

/// Spawn a face driven by fake adapters
pub fn spawn_face(config: &Config, hold_playback: bool) -> Harness {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let log = Arc::new(Mutex::new(Vec::new()));
    let monitor = Monitor::new();

    let capture = Arc::new(FakeCapture {
        events: events_tx.clone(),
        active: AtomicBool::new(false),
        log: Arc::clone(&log),
        monitor: Arc::clone(&monitor),
    });
    let playback = Arc::new(FakePlayback {
        events: events_tx.clone(),
        playing: Mutex::new(None),
        hold: hold_playback,
        log: Arc::clone(&log),
        monitor: Arc::clone(&monitor),
    });

    let face = Face::new(
        config,
        capture,
        Arc::clone(&playback) as Arc<dyn PlaybackAdapter>,
        events_tx,
        events_rx,
    );
    let handle = face.handle();
    tokio::spawn(face.run());

    Harness {
        handle,
        log,
        monitor,
        playback,
    }
}

/// Let the event loop drain and near-term timers fire
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
}
