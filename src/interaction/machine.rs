//! Interaction state machine
//!
//! The sole arbiter of the microphone and the audio-output channel. Adapter
//! callbacks, timers, and user triggers arrive as [`Event`]s; the machine
//! returns the [`Action`]s the driver must execute. No I/O, no timers here,
//! so every transition is unit-testable without audio hardware.
//!
//! Capture and playback never overlap: every `Speak` is preceded by
//! `StopCapture`, and capture only restarts once playback has ended or after
//! the settle delay on an explicit start trigger.

use super::interpreter::{self, Interpretation};
use super::reaction::ReactionPicker;
use super::types::{
    FaceView, InteractionMode, PendingRequest, RecognitionResult, Side, Utterance,
    UtteranceSource,
};

/// An input to the state machine.
///
/// Events may be interleaved in any order the environment schedules them;
/// every handler tolerates being entered from any state.
#[derive(Debug, Clone)]
pub enum Event {
    /// External start-listening trigger (mic button)
    StartRequested,
    /// The settle delay after a stop has elapsed
    SettleElapsed {
        /// Token issued with the matching `ScheduleSettle`
        token: u64,
    },
    /// Capture session became active
    ListeningStarted,
    /// Capture session ended
    ListeningStopped,
    /// Capture session produced its one recognized text
    Recognized(RecognitionResult),
    /// The remote responder produced a reply
    ReplyReady {
        /// Generation the request was dispatched under
        generation: u64,
        /// Reply to speak if still current
        utterance: Utterance,
    },
    /// Playback of an utterance became audible
    SpeechStarted {
        /// Speech id issued with the matching `Speak`
        id: u64,
    },
    /// Playback of an utterance finished (or was cancelled)
    SpeechEnded {
        /// Speech id issued with the matching `Speak`
        id: u64,
    },
    /// Cheek-touch reaction trigger
    CheekTouched(Side),
    /// A blush has been visible for its full duration
    BlushExpired(Side),
}

/// A side effect the driver must execute, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Begin a capture session (no-op in the adapter if already active)
    StartCapture,
    /// End any capture session immediately (idempotent)
    StopCapture,
    /// Cancel any in-flight playback
    CancelPlayback,
    /// Queue exactly one utterance for playback
    Speak {
        /// Id echoed back in `SpeechStarted`/`SpeechEnded`
        id: u64,
        /// Utterance to synthesize
        utterance: Utterance,
    },
    /// Send the query to the remote responder
    Dispatch {
        /// Generation to tag the eventual `ReplyReady` with
        generation: u64,
        /// Recognized text to forward
        query: String,
    },
    /// Start the settle-delay timer
    ScheduleSettle {
        /// Token echoed back in `SettleElapsed`
        token: u64,
    },
    /// Start the blush expiry timer for one side
    ScheduleBlushClear(Side),
}

/// The interaction state machine
#[derive(Debug)]
pub struct Machine {
    mode: InteractionMode,
    capture_active: bool,
    session_recognized: bool,
    restart_pending: bool,
    settle_token: u64,
    generation: u64,
    speech_seq: u64,
    current_speech: Option<u64>,
    pending: Option<PendingRequest>,
    blush: [bool; 2],
    transcript: Option<String>,
    owner: String,
    picker: ReactionPicker,
}

impl Machine {
    /// Create a machine in `Idle` with no session active
    #[must_use]
    pub fn new(owner: impl Into<String>, picker: ReactionPicker) -> Self {
        Self {
            mode: InteractionMode::Idle,
            capture_active: false,
            session_recognized: false,
            restart_pending: false,
            settle_token: 0,
            generation: 0,
            speech_seq: 0,
            current_speech: None,
            pending: None,
            blush: [false; 2],
            transcript: None,
            owner: owner.into(),
            picker,
        }
    }

    /// Current interaction mode
    #[must_use]
    pub const fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Whether a remote request is in flight
    #[must_use]
    pub const fn has_pending_request(&self) -> bool {
        self.pending.is_some()
    }

    /// Read-only projection for the visual layer
    #[must_use]
    pub fn view(&self) -> FaceView {
        FaceView {
            is_listening: self.capture_active,
            mouth_open: self.mode == InteractionMode::Speaking,
            blush_left: self.blush[Side::Left.index()],
            blush_right: self.blush[Side::Right.index()],
            transcript: self.transcript.clone(),
        }
    }

    /// Dispatch one event, returning the side effects to execute in order
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::StartRequested => self.on_start_requested(),
            Event::SettleElapsed { token } => self.on_settle_elapsed(token),
            Event::ListeningStarted => {
                self.capture_active = true;
                self.session_recognized = false;
                self.mode = InteractionMode::Listening;
                Vec::new()
            }
            Event::ListeningStopped => self.on_listening_stopped(),
            Event::Recognized(result) => self.on_recognized(&result),
            Event::ReplyReady {
                generation,
                utterance,
            } => self.on_reply_ready(generation, utterance),
            Event::SpeechStarted { id } => {
                if self.current_speech == Some(id) {
                    self.mode = InteractionMode::Speaking;
                } else {
                    tracing::debug!(id, "ignoring stale speech start");
                }
                Vec::new()
            }
            Event::SpeechEnded { id } => self.on_speech_ended(id),
            Event::CheekTouched(side) => self.on_cheek_touched(side),
            Event::BlushExpired(side) => {
                self.blush[side.index()] = false;
                Vec::new()
            }
        }
    }

    /// Mic-button trigger: stop whatever is in progress, then restart capture
    /// after the settle delay. A strict hand-off; never simultaneous
    /// record+playback.
    fn on_start_requested(&mut self) -> Vec<Action> {
        // A new interaction begins; any in-flight reply is now stale.
        self.generation += 1;
        self.pending = None;
        self.current_speech = None;
        self.settle_token += 1;
        self.restart_pending = true;
        self.mode = InteractionMode::Idle;

        vec![
            Action::CancelPlayback,
            Action::StopCapture,
            Action::ScheduleSettle {
                token: self.settle_token,
            },
        ]
    }

    fn on_settle_elapsed(&mut self, token: u64) -> Vec<Action> {
        if token == self.settle_token && self.restart_pending {
            self.restart_pending = false;
            vec![Action::StartCapture]
        } else {
            tracing::debug!(token, "ignoring stale settle timer");
            Vec::new()
        }
    }

    fn on_listening_stopped(&mut self) -> Vec<Action> {
        self.capture_active = false;

        // A session that ended without recognizing anything falls back to
        // Idle in silence. If it recognized text, the reply path owns the
        // mode from here.
        if self.mode == InteractionMode::Listening
            && !self.session_recognized
            && self.pending.is_none()
        {
            tracing::debug!("capture ended with no recognition");
            self.mode = InteractionMode::Idle;
        }
        Vec::new()
    }

    fn on_recognized(&mut self, result: &RecognitionResult) -> Vec<Action> {
        if self.mode != InteractionMode::Listening {
            tracing::debug!(text = %result.text, "ignoring recognition outside listening");
            return Vec::new();
        }

        self.session_recognized = true;
        self.transcript = Some(result.text.clone());
        tracing::info!(text = %result.text, "recognized");

        match interpreter::interpret(&result.text, result.timestamp, &self.owner) {
            Interpretation::Reply(text) => {
                self.issue_speak(Utterance::new(text, UtteranceSource::LocalCommand))
            }
            Interpretation::Forward => {
                self.generation += 1;
                self.pending = Some(PendingRequest {
                    query_text: result.text.clone(),
                    started_at: result.timestamp,
                    generation: self.generation,
                });
                vec![
                    Action::StopCapture,
                    Action::Dispatch {
                        generation: self.generation,
                        query: result.text.clone(),
                    },
                ]
            }
        }
    }

    fn on_reply_ready(&mut self, generation: u64, utterance: Utterance) -> Vec<Action> {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation);

        if current {
            self.pending = None;
            self.issue_speak(utterance)
        } else {
            tracing::debug!(generation, "discarding stale remote reply");
            Vec::new()
        }
    }

    /// Loop closure: after any utterance finishes, capture restarts with no
    /// user action. Playback has fully ended here, so no settle is needed.
    fn on_speech_ended(&mut self, id: u64) -> Vec<Action> {
        if self.current_speech == Some(id) {
            self.current_speech = None;
            self.mode = InteractionMode::Idle;
            vec![Action::StartCapture]
        } else {
            tracing::debug!(id, "ignoring stale speech end");
            Vec::new()
        }
    }

    /// Reaction override: interrupts any state with a canned reply. Bumps the
    /// generation so a pending remote reply can no longer speak over it.
    fn on_cheek_touched(&mut self, side: Side) -> Vec<Action> {
        self.blush[side.index()] = true;
        self.generation += 1;
        self.pending = None;

        let reply = self.picker.pick();
        tracing::info!(?side, reply, "cheek touched");

        let mut actions = vec![Action::ScheduleBlushClear(side)];
        actions.extend(self.issue_speak(Utterance::new(
            reply,
            UtteranceSource::CannedReaction,
        )));
        actions
    }

    /// Every speak stops capture first; the playback adapter cancels any
    /// still-audible utterance itself. A pending settle restart is withdrawn:
    /// the mic must stay shut until this utterance's own end event.
    fn issue_speak(&mut self, utterance: Utterance) -> Vec<Action> {
        self.restart_pending = false;
        self.speech_seq += 1;
        self.current_speech = Some(self.speech_seq);
        vec![
            Action::StopCapture,
            Action::Speak {
                id: self.speech_seq,
                utterance,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Machine {
        Machine::new("Ada", ReactionPicker::new(Some(1)))
    }

    fn recognized(text: &str) -> Event {
        Event::Recognized(RecognitionResult::new(text))
    }

    /// Pull the single Speak action out of an action list
    fn speak_of(actions: &[Action]) -> Option<(u64, Utterance)> {
        actions.iter().find_map(|a| match a {
            Action::Speak { id, utterance } => Some((*id, utterance.clone())),
            _ => None,
        })
    }

    #[test]
    fn test_start_trigger_settles_before_capture() {
        let mut m = machine();

        let actions = m.handle(Event::StartRequested);
        assert_eq!(
            actions,
            vec![
                Action::CancelPlayback,
                Action::StopCapture,
                Action::ScheduleSettle { token: 1 },
            ]
        );

        // Capture starts only after the settle timer fires
        let actions = m.handle(Event::SettleElapsed { token: 1 });
        assert_eq!(actions, vec![Action::StartCapture]);

        m.handle(Event::ListeningStarted);
        assert_eq!(m.mode(), InteractionMode::Listening);
        assert!(m.view().is_listening);
    }

    #[test]
    fn test_stale_settle_timer_is_ignored() {
        let mut m = machine();
        m.handle(Event::StartRequested);
        m.handle(Event::StartRequested); // re-trigger before settle

        assert!(m.handle(Event::SettleElapsed { token: 1 }).is_empty());
        assert_eq!(
            m.handle(Event::SettleElapsed { token: 2 }),
            vec![Action::StartCapture]
        );
    }

    #[test]
    fn test_local_command_speaks_exactly_once() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);

        let actions = m.handle(recognized("what time is it"));
        let (_, utterance) = speak_of(&actions).expect("a speak action");
        assert_eq!(utterance.source, UtteranceSource::LocalCommand);
        assert!(utterance.text.starts_with("The time is"));

        // Capture stops before playback begins
        assert_eq!(actions[0], Action::StopCapture);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_forward_dispatches_and_speaks_reply() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);

        let actions = m.handle(recognized("tell me a joke"));
        assert_eq!(actions[0], Action::StopCapture);
        let Action::Dispatch { generation, query } = &actions[1] else {
            panic!("expected dispatch, got {actions:?}");
        };
        assert_eq!(query, "tell me a joke");
        assert!(m.has_pending_request());

        let actions = m.handle(Event::ReplyReady {
            generation: *generation,
            utterance: Utterance::new("A funny one", UtteranceSource::RemoteReply),
        });
        let (_, utterance) = speak_of(&actions).expect("a speak action");
        assert_eq!(utterance.text, "A funny one");
        assert!(!m.has_pending_request());
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);

        let actions = m.handle(recognized("tell me a joke"));
        let Action::Dispatch { generation, .. } = &actions[1] else {
            panic!("expected dispatch");
        };
        let old_generation = *generation;

        // A reaction fires while the request is pending
        let actions = m.handle(Event::CheekTouched(Side::Left));
        assert!(speak_of(&actions).is_some());
        assert!(!m.has_pending_request());

        // The remote reply resolves afterwards and must not speak
        let actions = m.handle(Event::ReplyReady {
            generation: old_generation,
            utterance: Utterance::new("too late", UtteranceSource::RemoteReply),
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn test_speech_end_resumes_listening() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);
        let actions = m.handle(recognized("what's the date"));
        let (id, _) = speak_of(&actions).unwrap();

        m.handle(Event::ListeningStopped);
        m.handle(Event::SpeechStarted { id });
        assert_eq!(m.mode(), InteractionMode::Speaking);
        assert!(m.view().mouth_open);

        let actions = m.handle(Event::SpeechEnded { id });
        assert_eq!(actions, vec![Action::StartCapture]);
        assert!(!m.view().mouth_open);
    }

    #[test]
    fn test_stale_speech_events_are_noops() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);
        let first = speak_of(&m.handle(recognized("time please"))).unwrap().0;

        // Reaction replaces the local reply before it finishes
        let second = speak_of(&m.handle(Event::CheekTouched(Side::Right)))
            .unwrap()
            .0;
        assert_ne!(first, second);

        // The cancelled utterance's end must not restart capture
        assert!(m.handle(Event::SpeechEnded { id: first }).is_empty());
        assert_eq!(
            m.handle(Event::SpeechEnded { id: second }),
            vec![Action::StartCapture]
        );
    }

    #[test]
    fn test_empty_session_falls_back_to_idle() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);
        assert_eq!(m.mode(), InteractionMode::Listening);

        let actions = m.handle(Event::ListeningStopped);
        assert!(actions.is_empty());
        assert_eq!(m.mode(), InteractionMode::Idle);
        assert!(!m.view().is_listening);
    }

    #[test]
    fn test_recognition_outside_listening_is_dropped() {
        let mut m = machine();
        let actions = m.handle(recognized("what time is it"));
        assert!(actions.is_empty());
        assert_eq!(m.mode(), InteractionMode::Idle);
    }

    #[test]
    fn test_start_while_speaking_hands_off_in_order() {
        let mut m = machine();
        m.handle(Event::ListeningStarted);
        let (id, _) = speak_of(&m.handle(recognized("time"))).unwrap();
        m.handle(Event::SpeechStarted { id });
        assert_eq!(m.mode(), InteractionMode::Speaking);

        // Playback stops, then capture, then the settle delay, never a
        // capture start before the timer.
        let actions = m.handle(Event::StartRequested);
        assert_eq!(actions[0], Action::CancelPlayback);
        assert_eq!(actions[1], Action::StopCapture);
        assert!(matches!(actions[2], Action::ScheduleSettle { .. }));
        assert!(!actions.contains(&Action::StartCapture));
    }

    #[test]
    fn test_reaction_during_settle_window_withdraws_restart() {
        let mut m = machine();
        m.handle(Event::StartRequested);

        // A cheek touch lands before the settle timer fires
        let actions = m.handle(Event::CheekTouched(Side::Left));
        let (id, _) = speak_of(&actions).unwrap();
        m.handle(Event::SpeechStarted { id });

        // The timer must not open the mic into the reaction utterance
        assert!(m.handle(Event::SettleElapsed { token: 1 }).is_empty());
        assert_eq!(m.mode(), InteractionMode::Speaking);

        // The loop still closes through the utterance's own end event
        assert_eq!(
            m.handle(Event::SpeechEnded { id }),
            vec![Action::StartCapture]
        );
    }

    #[test]
    fn test_blush_sets_and_clears_per_side() {
        let mut m = machine();

        let actions = m.handle(Event::CheekTouched(Side::Left));
        assert!(actions.contains(&Action::ScheduleBlushClear(Side::Left)));
        assert!(m.view().blush_left);
        assert!(!m.view().blush_right);

        m.handle(Event::BlushExpired(Side::Left));
        assert!(!m.view().blush_left);
    }

    #[test]
    fn test_reaction_interrupts_any_state() {
        let mut m = machine();

        // From idle
        let actions = m.handle(Event::CheekTouched(Side::Right));
        let (id, utterance) = speak_of(&actions).unwrap();
        assert_eq!(utterance.source, UtteranceSource::CannedReaction);

        // From speaking: a fresh speak replaces the current one
        m.handle(Event::SpeechStarted { id });
        let actions = m.handle(Event::CheekTouched(Side::Left));
        let (next_id, _) = speak_of(&actions).unwrap();
        assert_ne!(id, next_id);
    }
}
