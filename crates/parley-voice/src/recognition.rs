//! RecognitionSession: life cycle of the continuous input engine.
//!
//! Folds engine results into the [`TranscriptAccumulator`] using the engine's
//! result cursor, arms the silence timer on every final fragment, and hides
//! unexpected engine ends behind an automatic restart. The rest of the system
//! only sees a monotonic transcript and a `listening` flag.

use crate::config::VoiceConfig;
use crate::engine::{RecognitionCallback, RecognitionEngine, RecognitionErrorKind, RecognitionResult};
use crate::error::{EngineError, VoiceError};
use crate::event::{EngineEvents, TimerKind};
use crate::timer::{OneShotTimer, SilenceCommitTimer};
use crate::transcript::TranscriptAccumulator;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the session reports back to the coordinator after handling a call
/// or callback.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionNotice {
    ListeningChanged(bool),
    /// Live display text changed. `interim` is this update's merged interim
    /// hypothesis (used for barge-in detection).
    Transcript { display: String, interim: String },
    /// A recoverable failure; the call stays active.
    Recoverable(VoiceError),
}

pub struct RecognitionSession {
    engine: Box<dyn RecognitionEngine>,
    accumulator: TranscriptAccumulator,
    silence: SilenceCommitTimer,
    restart: OneShotTimer,
    restart_delay: Duration,
    restart_on_commit: bool,
    /// Read when `Ended` arrives, never captured earlier.
    should_restart: bool,
    listening: bool,
    /// Finals at result positions below this were already folded during the
    /// current engine run.
    finals_folded: usize,
}

impl RecognitionSession {
    pub fn new(engine: Box<dyn RecognitionEngine>, events: EngineEvents, config: &VoiceConfig) -> Self {
        Self {
            engine,
            accumulator: TranscriptAccumulator::new(),
            silence: SilenceCommitTimer::new(config.silence_window(), events.clone()),
            restart: OneShotTimer::new(TimerKind::RecognitionRestart, events),
            restart_delay: config.restart_delay(),
            restart_on_commit: config.restart_on_commit,
            should_restart: false,
            listening: false,
            finals_folded: 0,
        }
    }

    /// Start listening. Idempotent: an "already started" engine is fine.
    pub fn start(&mut self) -> Vec<RecognitionNotice> {
        self.should_restart = true;
        self.restart.cancel();
        match self.engine.start() {
            Ok(()) => {
                debug!("recognition start requested");
                Vec::new()
            }
            Err(EngineError::AlreadyStarted) => {
                debug!("recognition already started, ignoring");
                Vec::new()
            }
            Err(e) => {
                warn!("recognition start failed: {}", e);
                self.mark_unavailable(e)
            }
        }
    }

    /// Stop listening. The `Ended` callback that follows will not restart.
    ///
    /// With a restart pending the engine has already ended and reports no
    /// further `Ended`, so listening is cleared here.
    pub fn stop(&mut self) -> Vec<RecognitionNotice> {
        self.should_restart = false;
        self.silence.cancel();
        let engine_down = self.restart.is_pending();
        self.restart.cancel();
        self.engine.stop();
        if engine_down {
            debug!("recognition stopped while waiting to restart");
            self.set_listening(false)
        } else {
            Vec::new()
        }
    }

    pub fn handle_callback(&mut self, callback: RecognitionCallback) -> Vec<RecognitionNotice> {
        match callback {
            RecognitionCallback::Started => self.on_started(),
            RecognitionCallback::Ended => self.on_ended(),
            RecognitionCallback::Result {
                result_index,
                results,
            } => self.on_result(result_index, &results),
            RecognitionCallback::Error(kind) => self.on_error(kind),
        }
    }

    /// Handle a fire of the restart timer.
    pub fn handle_restart_timer(&mut self, generation: u64) -> Vec<RecognitionNotice> {
        if !self.restart.fired(generation) {
            return Vec::new();
        }
        if !self.should_restart {
            debug!("restart timer fired after stop, not restarting");
            return Vec::new();
        }
        info!("🔄 Restarting recognition");
        match self.engine.start() {
            Ok(()) | Err(EngineError::AlreadyStarted) => Vec::new(),
            Err(e) => {
                warn!("recognition restart failed: {}", e);
                self.mark_unavailable(e)
            }
        }
    }

    /// Accept a silence timer fire. True exactly once per arm.
    pub fn accept_commit_due(&mut self, generation: u64) -> bool {
        self.silence.fired(generation)
    }

    /// Hand over the accumulated utterance and reset for the next turn.
    ///
    /// Returns `None` (and keeps the interim text) when nothing final was
    /// said. Otherwise cycles the engine so it forgets its result history.
    pub fn commit(&mut self) -> Option<String> {
        self.silence.cancel();
        let text = self.accumulator.utterance().trim().to_string();
        if text.is_empty() {
            debug!("empty commit discarded");
            return None;
        }
        self.accumulator.reset();
        if self.restart_on_commit && self.should_restart {
            // should_restart stays true, so the Ended that follows restarts.
            debug!("cycling recognition engine after commit");
            self.engine.stop();
        }
        Some(text)
    }

    /// Re-arm the silence timer if an utterance is waiting to be committed.
    pub fn rearm_if_pending(&mut self) -> bool {
        if self.should_restart && !self.accumulator.is_empty() {
            self.silence.arm();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.silence.cancel();
        self.accumulator.reset();
    }

    pub fn snapshot(&self) -> String {
        self.accumulator.snapshot()
    }

    pub fn utterance(&self) -> &str {
        self.accumulator.utterance()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn should_restart(&self) -> bool {
        self.should_restart
    }

    pub fn commit_pending(&self) -> bool {
        self.silence.is_pending()
    }

    fn on_started(&mut self) -> Vec<RecognitionNotice> {
        info!("🎤 Recognition started");
        // New engine run, new result list.
        self.finals_folded = 0;
        self.set_listening(true)
    }

    fn on_ended(&mut self) -> Vec<RecognitionNotice> {
        if self.should_restart {
            debug!(
                "recognition ended unexpectedly, restarting in {:?}",
                self.restart_delay
            );
            self.restart.arm(self.restart_delay);
            Vec::new()
        } else {
            info!("🛑 Recognition ended");
            self.set_listening(false)
        }
    }

    fn on_result(&mut self, result_index: usize, results: &[RecognitionResult]) -> Vec<RecognitionNotice> {
        let mut interim = String::new();
        let mut got_final = false;

        for (position, result) in results.iter().enumerate().skip(result_index) {
            if result.is_final {
                if position < self.finals_folded {
                    continue;
                }
                self.accumulator.append_final(&result.transcript);
                self.finals_folded = position + 1;
                got_final = true;
            } else if position >= self.finals_folded {
                interim.push_str(&result.transcript);
            }
        }

        let interim = interim.trim().to_string();
        self.accumulator.set_interim(&interim);
        debug!(
            "transcript update: final={:?} interim={:?}",
            self.accumulator.utterance(),
            interim
        );

        if got_final && self.should_restart {
            self.silence.arm();
        }

        vec![RecognitionNotice::Transcript {
            display: self.accumulator.snapshot(),
            interim,
        }]
    }

    fn on_error(&mut self, kind: RecognitionErrorKind) -> Vec<RecognitionNotice> {
        if kind == RecognitionErrorKind::NoSpeech {
            debug!("no-speech from recognizer (silence)");
            return Vec::new();
        }
        warn!("Recognition error: {}", kind);
        if kind.stops_listening() {
            let mut notices = self.set_listening(false);
            notices.push(RecognitionNotice::Recoverable(VoiceError::Recognition(
                kind.to_string(),
            )));
            notices
        } else {
            Vec::new()
        }
    }

    fn mark_unavailable(&mut self, err: EngineError) -> Vec<RecognitionNotice> {
        let mut notices = self.set_listening(false);
        notices.push(RecognitionNotice::Recoverable(err.into()));
        notices
    }

    fn set_listening(&mut self, listening: bool) -> Vec<RecognitionNotice> {
        if self.listening == listening {
            return Vec::new();
        }
        self.listening = listening;
        vec![RecognitionNotice::ListeningChanged(listening)]
    }
}
