//! Turn Coordinator - the conversational state machine
//!
//! Single actor that owns the recognition and speech output sessions and the
//! call flags. Everything it reacts to (user commands, engine callbacks, timer
//! fires, backend replies) arrives as one [`VoiceEvent`] on one channel, and
//! every flag is read at the moment an event is handled.
//!
//! ```text
//!              StartCall
//!   Idle ─────────────────→ Listening ──CommitDue(text)──→ Processing
//!    ↑                       ↑   ↑                             │
//!    │ EndCall (any state)   │   └──── backend error ──────────┤
//!    │                       │                                 │ reply
//!    │                       └─ PlaybackEnded / barge-in ── Speaking
//! ```

use crate::backend::ResponseBackend;
use crate::config::VoiceConfig;
use crate::engine::{RecognitionEngine, SynthesisEngine};
use crate::error::{VoiceError, VoiceResult};
use crate::event::{CallCommand, EngineEvents, EventBus, TimerKind, VoiceEvent};
use crate::recognition::{RecognitionNotice, RecognitionSession};
use crate::speech_output::{PlaybackEvent, PlaybackOutcome, SpeechOutputSession};
use crate::timer::OneShotTimer;
use crate::voice::VoiceSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

const NOTICE_CAPACITY: usize = 64;

/// Conversation state. A call is inactive only in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Listening => "listening",
            TurnState::Processing => "processing",
            TurnState::Speaking => "speaking",
        }
    }
}

/// Flags of the active call. Written only by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CallSession {
    active: bool,
    muted: bool,
    listening: bool,
    speaking: bool,
    processing_pending: bool,
}

/// Read-only view for the presentation layer, published after every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSnapshot {
    pub state: TurnState,
    pub is_listening: bool,
    pub is_speaking: bool,
    pub is_processing: bool,
    pub is_muted: bool,
    pub call_active: bool,
    /// Finalized text plus the live interim hypothesis of the current turn.
    pub transcript: String,
}

/// Notices reported upward to the UI / application.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorNotice {
    /// An utterance was committed and sent to the backend.
    Committed { text: String, at: DateTime<Utc> },
    LiveTranscript(String),
    /// The backend replied; playback starts now.
    Reply(String),
    /// The user cut the reply short.
    Interrupted,
    /// Non-fatal engine problem; the call stays active.
    Recoverable(VoiceError),
    /// The backend failed; the turn was aborted.
    BackendFailed(VoiceError),
}

/// Cloneable handle for driving a running [`TurnCoordinator`].
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    events: EngineEvents,
    snapshot: watch::Receiver<VoiceSnapshot>,
    notices: broadcast::Sender<CoordinatorNotice>,
}

impl VoiceHandle {
    pub fn start_call(&self) -> VoiceResult<()> {
        self.events.command(CallCommand::StartCall)
    }

    pub fn end_call(&self) -> VoiceResult<()> {
        self.events.command(CallCommand::EndCall)
    }

    pub fn toggle_mute(&self) -> VoiceResult<()> {
        self.events.command(CallCommand::ToggleMute)
    }

    pub fn stop_speaking(&self) -> VoiceResult<()> {
        self.events.command(CallCommand::StopSpeaking)
    }

    pub fn force_commit(&self) -> VoiceResult<()> {
        self.events.command(CallCommand::ForceCommit)
    }

    pub fn update_voice_settings(&self, settings: VoiceSettings) -> VoiceResult<()> {
        self.events.command(CallCommand::UpdateVoiceSettings(settings))
    }

    pub fn shutdown(&self) -> VoiceResult<()> {
        self.events.command(CallCommand::Shutdown)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> VoiceSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch receiver for rendering loops that await changes.
    pub fn watch(&self) -> watch::Receiver<VoiceSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorNotice> {
        self.notices.subscribe()
    }

    /// Event sink for engines created after the coordinator.
    pub fn events(&self) -> EngineEvents {
        self.events.clone()
    }
}

pub struct TurnCoordinator {
    config: VoiceConfig,
    events: EngineEvents,
    rx: mpsc::UnboundedReceiver<VoiceEvent>,
    recognition: RecognitionSession,
    output: SpeechOutputSession,
    backend: Arc<dyn ResponseBackend>,
    state: TurnState,
    call: CallSession,
    /// Bumped on every commit and call boundary; backend replies carry it.
    turn: u64,
    call_start: OneShotTimer,
    listen_resume: OneShotTimer,
    snapshot_tx: watch::Sender<VoiceSnapshot>,
    notices: broadcast::Sender<CoordinatorNotice>,
}

impl TurnCoordinator {
    /// Build the coordinator around engines that post into `bus`.
    pub fn new(
        config: VoiceConfig,
        bus: EventBus,
        recognizer: Box<dyn RecognitionEngine>,
        synthesizer: Box<dyn SynthesisEngine>,
        backend: Arc<dyn ResponseBackend>,
    ) -> VoiceResult<(Self, VoiceHandle)> {
        config.validate()?;
        info!(
            target: "parley::voice",
            "🎭 Initializing turn coordinator (language={}, mode={:?}, silence={:?})",
            config.language,
            config.mode,
            config.silence_window()
        );

        let (events, rx) = bus.split();
        let recognition = RecognitionSession::new(recognizer, events.clone(), &config);
        let output = SpeechOutputSession::new(
            synthesizer,
            config.voice.clone(),
            &config.preferred_voices,
            &config.language,
            config.voice_enabled,
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(VoiceSnapshot::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let handle = VoiceHandle {
            events: events.clone(),
            snapshot: snapshot_rx,
            notices: notices.clone(),
        };

        let coordinator = Self {
            call_start: OneShotTimer::new(TimerKind::CallStart, events.clone()),
            listen_resume: OneShotTimer::new(TimerKind::ListenResume, events.clone()),
            config,
            events,
            rx,
            recognition,
            output,
            backend,
            state: TurnState::Idle,
            call: CallSession::default(),
            turn: 0,
            snapshot_tx,
            notices,
        };
        Ok((coordinator, handle))
    }

    /// Run until `Shutdown`. Spawn this on the runtime.
    pub async fn run(mut self) {
        info!(target: "parley::voice", "🚀 Turn coordinator running");
        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        info!(target: "parley::voice", "🛑 Turn coordinator stopped");
    }

    /// The single dispatch point. Returns false once the loop should stop.
    pub fn handle_event(&mut self, event: VoiceEvent) -> bool {
        let keep_running = match event {
            VoiceEvent::Command(command) => self.handle_command(command),
            VoiceEvent::Recognition(callback) => {
                let notices = self.recognition.handle_callback(callback);
                self.apply_recognition(notices);
                true
            }
            VoiceEvent::Synthesis {
                utterance,
                callback,
            } => {
                if let Some(playback) = self.output.handle_callback(utterance, callback) {
                    self.on_playback(playback);
                }
                true
            }
            VoiceEvent::Timer { kind, generation } => {
                self.handle_timer(kind, generation);
                true
            }
            VoiceEvent::Backend { turn, reply } => {
                self.on_backend_reply(turn, reply);
                true
            }
        };
        self.publish();
        keep_running
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        VoiceSnapshot {
            state: self.state,
            is_listening: self.call.listening && !self.call.muted,
            is_speaking: self.call.speaking,
            is_processing: self.call.processing_pending,
            is_muted: self.call.muted,
            call_active: self.call.active,
            transcript: self.recognition.snapshot(),
        }
    }

    fn handle_command(&mut self, command: CallCommand) -> bool {
        match command {
            CallCommand::StartCall => self.start_call(),
            CallCommand::EndCall => self.end_call(),
            CallCommand::ToggleMute => self.toggle_mute(),
            CallCommand::StopSpeaking => self.stop_speaking(),
            CallCommand::ForceCommit => self.force_commit(),
            CallCommand::UpdateVoiceSettings(settings) => self.output.update_settings(settings),
            CallCommand::Shutdown => {
                if self.call.active {
                    self.end_call();
                }
                return false;
            }
        }
        true
    }

    fn start_call(&mut self) {
        if self.call.active {
            debug!("StartCall while a call is active ignored");
            return;
        }
        info!(target: "parley::voice", "📞 Call started");
        self.recognition.reset();
        self.turn += 1;
        self.call = CallSession {
            active: true,
            ..Default::default()
        };
        self.state = TurnState::Listening;
        self.call_start.arm(self.config.call_start_delay());
    }

    fn end_call(&mut self) {
        if !self.call.active {
            debug!("EndCall without an active call");
        }
        let notices = self.recognition.stop();
        self.apply_recognition(notices);
        // Resolved here; nothing waits on it once the call is gone.
        let _ = self.output.cancel();
        self.recognition.reset();
        self.call_start.cancel();
        self.listen_resume.cancel();
        self.call = CallSession::default();
        // Any reply still in flight belongs to a dead turn.
        self.turn += 1;
        self.state = TurnState::Idle;
        info!(target: "parley::voice", "📴 Call ended");
    }

    fn toggle_mute(&mut self) {
        if !self.call.active {
            warn!("ToggleMute without an active call ignored");
            return;
        }
        self.call.muted = !self.call.muted;
        if self.call.muted {
            info!(target: "parley::voice", "🔇 Muted");
            self.call_start.cancel();
            self.listen_resume.cancel();
            let notices = self.recognition.stop();
            self.apply_recognition(notices);
            return;
        }

        info!(target: "parley::voice", "🎙️ Unmuted");
        if self.state == TurnState::Speaking {
            // Listening resumes when the reply ends.
            return;
        }
        self.start_recognition();
        self.recognition.rearm_if_pending();
    }

    fn stop_speaking(&mut self) {
        if self.state != TurnState::Speaking {
            debug!("StopSpeaking while {} ignored", self.state.as_str());
            return;
        }
        if self.output.cancel().is_some() {
            self.notify(CoordinatorNotice::Interrupted);
        }
        self.enter_listening();
        if !self.call.muted && !self.recognition.is_listening() {
            self.start_recognition();
        }
    }

    fn force_commit(&mut self) {
        if !self.call.active {
            warn!("ForceCommit without an active call ignored");
            return;
        }
        if self.state != TurnState::Listening {
            debug!("ForceCommit while {} ignored", self.state.as_str());
            return;
        }
        self.commit();
    }

    fn handle_timer(&mut self, kind: TimerKind, generation: u64) {
        match kind {
            TimerKind::SilenceCommit => {
                if !self.recognition.accept_commit_due(generation) {
                    return;
                }
                if !self.call.active {
                    warn!("CommitDue without an active call ignored");
                    return;
                }
                if self.state == TurnState::Listening {
                    self.commit();
                } else {
                    // Re-armed when the coordinator is back in Listening.
                    debug!("CommitDue while {}, deferred", self.state.as_str());
                }
            }
            TimerKind::RecognitionRestart => {
                let notices = self.recognition.handle_restart_timer(generation);
                self.apply_recognition(notices);
            }
            TimerKind::CallStart => {
                if self.call_start.fired(generation) && self.call.active && !self.call.muted {
                    self.start_recognition();
                }
            }
            TimerKind::ListenResume => {
                if !self.listen_resume.fired(generation) {
                    return;
                }
                if self.call.active
                    && !self.call.muted
                    && self.state == TurnState::Listening
                    && !self.recognition.is_listening()
                {
                    self.start_recognition();
                }
            }
        }
    }

    fn commit(&mut self) {
        let Some(text) = self.recognition.commit() else {
            return;
        };
        self.turn += 1;
        self.state = TurnState::Processing;
        info!(
            target: "parley::voice",
            "📝 Committed turn {} ({} chars)",
            self.turn,
            text.chars().count()
        );
        self.notify(CoordinatorNotice::Committed {
            text: text.clone(),
            at: Utc::now(),
        });

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let turn = self.turn;
        tokio::spawn(async move {
            let reply = backend.respond(text).await;
            events.post(VoiceEvent::Backend { turn, reply });
        });
    }

    fn on_backend_reply(&mut self, turn: u64, reply: VoiceResult<String>) {
        if turn != self.turn || self.state != TurnState::Processing {
            debug!("stale backend reply for turn {} dropped", turn);
            return;
        }
        match reply {
            Ok(text) if !text.trim().is_empty() => {
                debug!("backend replied for turn {}", turn);
                self.notify(CoordinatorNotice::Reply(text.clone()));
                self.speak(&text);
            }
            Ok(_) => {
                warn!("Backend returned an empty reply, turn aborted");
                self.notify(CoordinatorNotice::BackendFailed(VoiceError::Backend(
                    "empty reply".to_string(),
                )));
                self.finish_turn();
            }
            Err(e) => {
                warn!("Backend failed: {}, turn aborted", e);
                self.notify(CoordinatorNotice::BackendFailed(e));
                self.finish_turn();
            }
        }
    }

    fn speak(&mut self, text: &str) {
        self.state = TurnState::Speaking;
        let (utterance, resolved) = self.output.speak(text);
        for playback in resolved {
            if matches!(&playback, PlaybackEvent::Ended { utterance: u, .. } if *u == utterance) {
                self.on_playback(playback);
            }
        }
    }

    fn on_playback(&mut self, playback: PlaybackEvent) {
        match playback {
            PlaybackEvent::Started(utterance) => {
                debug!("🔊 Playback of {} started", utterance);
            }
            PlaybackEvent::Ended { utterance, outcome } => {
                debug!("Playback of {} ended: {:?}", utterance, outcome);
                if let PlaybackOutcome::Failed(reason) = outcome {
                    self.notify(CoordinatorNotice::Recoverable(VoiceError::Synthesis(reason)));
                }
                if self.state == TurnState::Speaking {
                    self.finish_turn();
                }
            }
        }
    }

    /// Reply done (or aborted): back to Listening, resuming recognition after
    /// a short delay when needed.
    fn finish_turn(&mut self) {
        self.enter_listening();
        if !self.call.muted && !self.recognition.is_listening() {
            self.listen_resume.arm(self.config.resume_delay());
        }
    }

    fn enter_listening(&mut self) {
        self.state = TurnState::Listening;
        if self.recognition.rearm_if_pending() {
            debug!("pending utterance, silence timer re-armed");
        }
    }

    fn barge_in(&mut self) {
        info!(target: "parley::voice", "🗣️ Barge-in, interrupting reply");
        // Recognition keeps running; the new utterance is already accumulating.
        let _ = self.output.cancel();
        self.notify(CoordinatorNotice::Interrupted);
        self.enter_listening();
    }

    fn start_recognition(&mut self) {
        let notices = self.recognition.start();
        self.apply_recognition(notices);
    }

    fn apply_recognition(&mut self, notices: Vec<RecognitionNotice>) {
        for notice in notices {
            match notice {
                RecognitionNotice::ListeningChanged(listening) => {
                    debug!("recognition listening={}", listening);
                }
                RecognitionNotice::Transcript { display, interim } => {
                    if !self.call.active {
                        continue;
                    }
                    self.notify(CoordinatorNotice::LiveTranscript(display));
                    if self.state == TurnState::Speaking
                        && interim.trim().chars().count() >= self.config.barge_in_min_chars
                    {
                        self.barge_in();
                    }
                }
                RecognitionNotice::Recoverable(err) => {
                    if self.call.active {
                        warn!(target: "parley::voice", "Recoverable voice error: {}", err);
                        self.notify(CoordinatorNotice::Recoverable(err));
                    }
                }
            }
        }
    }

    fn notify(&self, notice: CoordinatorNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }

    fn publish(&mut self) {
        self.call.listening = self.call.active && self.recognition.is_listening();
        self.call.speaking = self.state == TurnState::Speaking;
        self.call.processing_pending = self.state == TurnState::Processing;
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EchoBackend;
    use crate::error::EngineError;
    use crate::engine::{RecognitionCallback, RecognitionResult, UtteranceId};

    struct NullRecognizer;

    impl RecognitionEngine for NullRecognizer {
        fn start(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    struct NullSynth;

    impl SynthesisEngine for NullSynth {
        fn speak(&mut self, _: UtteranceId, _: &str, _: &VoiceSettings) -> Result<(), EngineError> {
            Ok(())
        }
        fn cancel(&mut self) {}
    }

    fn coordinator(config: VoiceConfig) -> (TurnCoordinator, VoiceHandle) {
        TurnCoordinator::new(
            config,
            EventBus::new(),
            Box::new(NullRecognizer),
            Box::new(NullSynth),
            Arc::new(EchoBackend),
        )
        .unwrap()
    }

    fn final_result(text: &str) -> VoiceEvent {
        VoiceEvent::Recognition(RecognitionCallback::Result {
            result_index: 0,
            results: vec![RecognitionResult::finalized(text)],
        })
    }

    #[test]
    fn rejects_invalid_config() {
        let config = VoiceConfig {
            chat_silence_ms: 0,
            ..Default::default()
        };
        let result = TurnCoordinator::new(
            config,
            EventBus::new(),
            Box::new(NullRecognizer),
            Box::new(NullSynth),
            Arc::new(EchoBackend),
        );
        assert!(matches!(result, Err(VoiceError::Config(_))));
    }

    #[tokio::test]
    async fn start_call_enters_listening() {
        let (mut c, handle) = coordinator(VoiceConfig::default());
        assert_eq!(handle.snapshot().state, TurnState::Idle);

        c.handle_event(VoiceEvent::Command(CallCommand::StartCall));
        let snap = handle.snapshot();
        assert_eq!(snap.state, TurnState::Listening);
        assert!(snap.call_active);
        assert!(!snap.is_listening, "engine has not reported start yet");

        c.handle_event(VoiceEvent::Recognition(RecognitionCallback::Started));
        assert!(handle.snapshot().is_listening);
    }

    #[tokio::test]
    async fn commit_without_call_is_ignored() {
        let (mut c, _handle) = coordinator(VoiceConfig::default());
        c.handle_event(VoiceEvent::Command(CallCommand::ForceCommit));
        assert_eq!(c.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn force_commit_moves_to_processing() {
        let (mut c, handle) = coordinator(VoiceConfig::default());
        let mut notices = handle.subscribe();
        c.handle_event(VoiceEvent::Command(CallCommand::StartCall));
        c.handle_event(VoiceEvent::Recognition(RecognitionCallback::Started));
        c.handle_event(final_result("bom dia"));
        c.handle_event(VoiceEvent::Command(CallCommand::ForceCommit));

        assert_eq!(c.state(), TurnState::Processing);
        assert!(handle.snapshot().is_processing);

        assert_eq!(
            notices.try_recv().unwrap(),
            CoordinatorNotice::LiveTranscript("bom dia".into())
        );
        assert!(matches!(
            notices.try_recv().unwrap(),
            CoordinatorNotice::Committed { ref text, .. } if text == "bom dia"
        ));
    }

    #[tokio::test]
    async fn stale_backend_reply_is_dropped() {
        let (mut c, _handle) = coordinator(VoiceConfig::default());
        c.handle_event(VoiceEvent::Command(CallCommand::StartCall));
        c.handle_event(final_result("oi"));
        c.handle_event(VoiceEvent::Command(CallCommand::ForceCommit));
        let turn = c.turn;
        c.handle_event(VoiceEvent::Command(CallCommand::EndCall));

        c.handle_event(VoiceEvent::Backend {
            turn,
            reply: Ok("tarde demais".into()),
        });
        assert_eq!(c.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (mut c, _handle) = coordinator(VoiceConfig::default());
        c.handle_event(VoiceEvent::Command(CallCommand::StartCall));
        assert!(!c.handle_event(VoiceEvent::Command(CallCommand::Shutdown)));
        assert_eq!(c.state(), TurnState::Idle);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(VoiceSnapshot::default()).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["isListening"], false);
        assert_eq!(json["callActive"], false);
    }
}
