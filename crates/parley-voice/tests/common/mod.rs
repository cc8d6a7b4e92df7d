//! Scripted engines and a fake backend for driving the coordinator in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parley_voice::{
    CoordinatorNotice, EngineError, EngineEvents, EventBus, RecognitionEngine, RecognitionResult,
    ResponseBackend, SynthesisEngine, TurnCoordinator, UtteranceId, VoiceConfig, VoiceError,
    VoiceHandle, VoiceResult, VoiceSettings,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let the coordinator and engine tasks drain their queues.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time, then settle.
pub async fn advance_ms(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

#[derive(Debug, Default)]
pub struct RecognizerState {
    pub running: bool,
    pub starts: usize,
    pub stops: usize,
    /// Start calls that fail with `Unavailable` before one succeeds.
    pub failing_starts: usize,
    /// Result list of the current engine run; cleared on start.
    pub results: Vec<RecognitionResult>,
}

/// Continuous recognizer that keeps its whole result list per run, the way
/// browser-style engines do.
#[derive(Clone)]
pub struct ScriptedRecognizer {
    events: EngineEvents,
    pub state: Arc<Mutex<RecognizerState>>,
}

impl ScriptedRecognizer {
    pub fn new(events: EngineEvents) -> Self {
        Self {
            events,
            state: Arc::new(Mutex::new(RecognizerState::default())),
        }
    }

    /// The engine finalizes `text` as the next result.
    pub fn final_fragment(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.results.push(RecognitionResult::finalized(text));
        let index = state.results.len() - 1;
        self.events.recognition_result(index, state.results.clone());
    }

    /// The engine reports a live hypothesis after its finals.
    pub fn interim(&self, text: &str) {
        let state = self.state.lock().unwrap();
        let mut results = state.results.clone();
        let index = results.len();
        results.push(RecognitionResult::interim(text));
        self.events.recognition_result(index, results);
    }

    /// The engine stops on its own.
    pub fn crash(&self) {
        self.state.lock().unwrap().running = false;
        self.events.recognition_ended();
    }

    pub fn fail_next_starts(&self, count: usize) {
        self.state.lock().unwrap().failing_starts = count;
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }
}

impl RecognitionEngine for ScriptedRecognizer {
    fn start(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(EngineError::Unavailable("microphone busy".into()));
        }
        if state.running {
            return Err(EngineError::AlreadyStarted);
        }
        state.running = true;
        state.starts += 1;
        state.results.clear();
        self.events.recognition_started();
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        if state.running {
            state.running = false;
            self.events.recognition_ended();
        }
    }
}

#[derive(Debug, Default)]
pub struct SynthState {
    pub spoken: Vec<(UtteranceId, String)>,
    pub cancels: usize,
    pub settings: Vec<VoiceSettings>,
    task: Option<JoinHandle<()>>,
}

/// Synthesizer whose playback lasts a fixed time.
#[derive(Clone)]
pub struct ScriptedSynthesizer {
    events: EngineEvents,
    playback: Duration,
    pub state: Arc<Mutex<SynthState>>,
}

impl ScriptedSynthesizer {
    pub fn new(events: EngineEvents, playback: Duration) -> Self {
        Self {
            events,
            playback,
            state: Arc::new(Mutex::new(SynthState::default())),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .spoken
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    pub fn last_settings(&self) -> Option<VoiceSettings> {
        self.state.lock().unwrap().settings.last().cloned()
    }
}

impl SynthesisEngine for ScriptedSynthesizer {
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.spoken.push((utterance, text.to_string()));
        state.settings.push(settings.clone());
        self.events.synthesis_started(utterance);
        let events = self.events.clone();
        let playback = self.playback;
        state.task = Some(tokio::spawn(async move {
            tokio::time::sleep(playback).await;
            events.synthesis_ended(utterance);
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.cancels += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }
    }
}

/// Backend that replies from a script ("Olá!" once the script runs out).
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    replies: Arc<Mutex<VecDeque<VoiceResult<String>>>>,
    received: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn push_reply(&self, reply: VoiceResult<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_error(&self, message: &str) {
        self.push_reply(Err(VoiceError::Backend(message.to_string())));
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseBackend for ScriptedBackend {
    async fn respond(&self, text: String) -> VoiceResult<String> {
        self.received.lock().unwrap().push(text);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok("Olá!".to_string()))
    }
}

/// A running coordinator plus the scripts driving it.
pub struct Harness {
    pub handle: VoiceHandle,
    pub recognizer: ScriptedRecognizer,
    pub synth: ScriptedSynthesizer,
    pub backend: ScriptedBackend,
    pub notices: broadcast::Receiver<CoordinatorNotice>,
}

impl Harness {
    pub fn start(config: VoiceConfig, playback: Duration, backend: ScriptedBackend) -> Self {
        init_tracing();
        let bus = EventBus::new();
        let recognizer = ScriptedRecognizer::new(bus.events());
        let synth = ScriptedSynthesizer::new(bus.events(), playback);
        let (coordinator, handle) = TurnCoordinator::new(
            config,
            bus,
            Box::new(recognizer.clone()),
            Box::new(synth.clone()),
            Arc::new(backend.clone()),
        )
        .unwrap();
        let notices = handle.subscribe();
        tokio::spawn(coordinator.run());
        Self {
            handle,
            recognizer,
            synth,
            backend,
            notices,
        }
    }

    /// Start a call and wait out the start delay so the recognizer is running.
    pub async fn start_listening(&self) {
        self.handle.start_call().unwrap();
        settle().await;
        advance_ms(500).await;
    }

    pub fn drain_notices(&mut self) -> Vec<CoordinatorNotice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }
}
