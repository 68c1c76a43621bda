//! The face driver
//!
//! Owns the interaction state machine and the adapters, pumps the single
//! event queue, and executes the machine's actions. All transitions happen on
//! this one task; adapter threads, timers, and HTTP handlers only send
//! events, which preserves the cooperative, one-callback-at-a-time semantics
//! the machine assumes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::interaction::{Action, Event, FaceView, Machine, ReactionPicker};
use crate::responder::ResponderClient;
use crate::voice::{CaptureAdapter, PlaybackAdapter};
use crate::Config;

/// Handle used by the HTTP API (and anything else) to poke the face
#[derive(Clone)]
pub struct FaceHandle {
    events: mpsc::UnboundedSender<Event>,
    view: watch::Receiver<FaceView>,
}

impl FaceHandle {
    /// Send an event into the interaction loop
    pub fn send(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::warn!("interaction loop is gone, dropping event");
        }
    }

    /// Snapshot of the current face projection
    #[must_use]
    pub fn view(&self) -> FaceView {
        self.view.borrow().clone()
    }

    /// Watch receiver for consumers that want change notifications
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FaceView> {
        self.view.clone()
    }
}

/// The face daemon: state machine + adapters + remote responder
pub struct Face {
    machine: Machine,
    capture: Arc<dyn CaptureAdapter>,
    playback: Arc<dyn PlaybackAdapter>,
    responder: ResponderClient,
    settle_delay: Duration,
    blush_duration: Duration,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    view_tx: watch::Sender<FaceView>,
    view_rx: watch::Receiver<FaceView>,
}

impl Face {
    /// Create a face from its collaborators.
    ///
    /// The same event sender handed to the adapters must be the one returned
    /// by [`Face::handle`], so their callbacks land on this loop.
    #[must_use]
    pub fn new(
        config: &Config,
        capture: Arc<dyn CaptureAdapter>,
        playback: Arc<dyn PlaybackAdapter>,
        events_tx: mpsc::UnboundedSender<Event>,
        events_rx: mpsc::UnboundedReceiver<Event>,
    ) -> Self {
        let machine = Machine::new(
            config.owner_name.clone(),
            ReactionPicker::new(config.reaction_seed),
        );
        let responder = ResponderClient::new(config.chat_endpoint.clone());
        let (view_tx, view_rx) = watch::channel(machine.view());

        Self {
            machine,
            capture,
            playback,
            responder,
            settle_delay: config.settle_delay,
            blush_duration: config.blush_duration,
            events_tx,
            events_rx,
            view_tx,
            view_rx,
        }
    }

    /// Handle for sending triggers and reading the face projection
    #[must_use]
    pub fn handle(&self) -> FaceHandle {
        FaceHandle {
            events: self.events_tx.clone(),
            view: self.view_rx.clone(),
        }
    }

    /// Run the interaction loop for the life of the process
    pub async fn run(mut self) {
        tracing::info!("interaction loop running");

        while let Some(event) = self.events_rx.recv().await {
            tracing::trace!(?event, "handling event");
            let actions = self.machine.handle(event);

            for action in actions {
                self.execute(action).await;
            }

            // Publish the projection after every transition; the visual
            // layer only ever reads it.
            self.view_tx.send_replace(self.machine.view());
        }

        tracing::info!("interaction loop stopped");
    }

    async fn execute(&self, action: Action) {
        tracing::trace!(?action, "executing action");

        match action {
            Action::StartCapture => {
                if let Err(e) = self.capture.start().await {
                    tracing::error!(error = %e, "capture start failed");
                }
            }
            Action::StopCapture => self.capture.stop(),
            Action::CancelPlayback => self.playback.cancel(),
            Action::Speak { id, utterance } => {
                tracing::info!(source = ?utterance.source, text = %utterance.text, "speaking");
                if let Err(e) = self.playback.speak(id, &utterance.text).await {
                    tracing::error!(error = %e, "speak failed");
                }
            }
            Action::Dispatch { generation, query } => {
                let responder = self.responder.clone();
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let utterance = responder.ask(&query).await;
                    let _ = events.send(Event::ReplyReady {
                        generation,
                        utterance,
                    });
                });
            }
            Action::ScheduleSettle { token } => {
                let events = self.events_tx.clone();
                let delay = self.settle_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(Event::SettleElapsed { token });
                });
            }
            Action::ScheduleBlushClear(side) => {
                let events = self.events_tx.clone();
                let duration = self.blush_duration;
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = events.send(Event::BlushExpired(side));
                });
            }
        }
    }
}
