//! Placeholder engines for running the coordinator without audio hardware.

use crate::engine::{RecognitionEngine, SynthesisEngine, SynthesisErrorKind, UtteranceId};
use crate::error::EngineError;
use crate::event::EngineEvents;
use crate::voice::{VoiceInfo, VoiceSettings};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Reports start/end only. Results are posted by whoever drives it, e.g. a
/// console script through [`EngineEvents::recognition_result`].
#[derive(Debug)]
pub struct PlaceholderRecognizer {
    events: EngineEvents,
    running: bool,
}

impl PlaceholderRecognizer {
    pub fn new(events: EngineEvents) -> Self {
        Self {
            events,
            running: false,
        }
    }
}

impl RecognitionEngine for PlaceholderRecognizer {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.running {
            return Err(EngineError::AlreadyStarted);
        }
        self.running = true;
        self.events.recognition_started();
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.events.recognition_ended();
        }
    }
}

/// Logs the text instead of playing it, and reports the end after a delay
/// proportional to the text length.
#[derive(Debug)]
pub struct PlaceholderSynthesizer {
    events: EngineEvents,
    per_char: Duration,
    voices: Vec<VoiceInfo>,
    current: Option<(UtteranceId, JoinHandle<()>)>,
}

impl PlaceholderSynthesizer {
    pub fn new(events: EngineEvents) -> Self {
        Self {
            events,
            per_char: Duration::from_millis(40),
            voices: Vec::new(),
            current: None,
        }
    }

    /// Simulated playback time per character.
    pub fn with_per_char(mut self, per_char: Duration) -> Self {
        self.per_char = per_char;
        self
    }

    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }
}

impl SynthesisEngine for PlaceholderSynthesizer {
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<(), EngineError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Unavailable(format!("no tokio runtime: {}", e)))?;
        self.cancel();

        info!(
            "🔊 [TTS placeholder, voice={}] {}",
            settings.voice.as_deref().unwrap_or("default"),
            text
        );
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        let duration = self.per_char.saturating_mul(chars).div_f32(settings.rate.max(0.1));
        let events = self.events.clone();
        events.synthesis_started(utterance);
        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            events.synthesis_ended(utterance);
        });
        self.current = Some((utterance, task));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some((utterance, task)) = self.current.take() {
            if !task.is_finished() {
                task.abort();
                self.events
                    .synthesis_error(utterance, SynthesisErrorKind::Interrupted);
            }
        }
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }
}
