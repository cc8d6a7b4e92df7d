//! **SpeechOutputSession**: one reply playback at a time, with clean interruption.
//!
//! Every `speak()` gets a fresh [`UtteranceId`]. Callbacks that carry an older
//! id belong to an utterance that was already resolved (cancelled or replaced)
//! and are dropped, so `PlaybackEnded` is reported exactly once per `speak()`.

use crate::engine::{SynthesisCallback, SynthesisEngine, UtteranceId};
use crate::voice::{select_voice, VoiceSettings};
use tracing::{debug, error, info};

/// How a playback finished.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Completed,
    /// Cancelled by barge-in, `StopSpeaking`, a newer `speak()` or call end.
    Interrupted,
    /// The engine reported a genuine failure. Still ends the turn.
    Failed(String),
    /// Voice output is disabled; nothing was played.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started(UtteranceId),
    Ended {
        utterance: UtteranceId,
        outcome: PlaybackOutcome,
    },
}

pub struct SpeechOutputSession {
    engine: Box<dyn SynthesisEngine>,
    settings: VoiceSettings,
    enabled: bool,
    next_id: u64,
    current: Option<UtteranceId>,
}

impl SpeechOutputSession {
    /// Wrap `engine`. When no voice is set explicitly, one is picked from the
    /// engine's catalog with [`select_voice`].
    pub fn new(
        engine: Box<dyn SynthesisEngine>,
        mut settings: VoiceSettings,
        preferred: &[String],
        language: &str,
        enabled: bool,
    ) -> Self {
        let voices = engine.voices();
        let chosen = select_voice(&voices, preferred, language, settings.voice.as_deref())
            .map(|v| v.name.clone());
        match &chosen {
            Some(name) => info!("🔊 Output voice: {}", name),
            None => debug!("no voice catalog, using engine default voice"),
        }
        if chosen.is_some() {
            settings.voice = chosen;
        }
        Self {
            engine,
            settings,
            enabled,
            next_id: 0,
            current: None,
        }
    }

    /// Start speaking `text`, interrupting whatever is playing.
    ///
    /// The returned events are already resolved: the `Ended` of a replaced
    /// utterance, or the `Ended` of this one when it could not start.
    pub fn speak(&mut self, text: &str) -> (UtteranceId, Vec<PlaybackEvent>) {
        let mut events = self.cancel().into_iter().collect::<Vec<_>>();

        self.next_id += 1;
        let utterance = UtteranceId(self.next_id);

        if !self.enabled {
            debug!("voice output disabled, skipping {}", utterance);
            events.push(PlaybackEvent::Ended {
                utterance,
                outcome: PlaybackOutcome::Skipped,
            });
            return (utterance, events);
        }

        match self.engine.speak(utterance, text, &self.settings) {
            Ok(()) => {
                debug!("🔊 Speaking {} ({} chars)", utterance, text.chars().count());
                self.current = Some(utterance);
            }
            Err(e) => {
                error!("Speech output failed to start: {}", e);
                events.push(PlaybackEvent::Ended {
                    utterance,
                    outcome: PlaybackOutcome::Failed(e.to_string()),
                });
            }
        }
        (utterance, events)
    }

    /// Stop the current playback. Resolves it as interrupted right away; the
    /// engine's own completion for it is ignored when it arrives.
    pub fn cancel(&mut self) -> Option<PlaybackEvent> {
        let utterance = self.current.take()?;
        info!("🛑 Interrupting {}", utterance);
        self.engine.cancel();
        Some(PlaybackEvent::Ended {
            utterance,
            outcome: PlaybackOutcome::Interrupted,
        })
    }

    pub fn handle_callback(
        &mut self,
        utterance: UtteranceId,
        callback: SynthesisCallback,
    ) -> Option<PlaybackEvent> {
        if self.current != Some(utterance) {
            debug!("stale {:?} for {} ignored", callback, utterance);
            return None;
        }
        match callback {
            SynthesisCallback::Started => Some(PlaybackEvent::Started(utterance)),
            SynthesisCallback::Ended => {
                self.current = None;
                Some(PlaybackEvent::Ended {
                    utterance,
                    outcome: PlaybackOutcome::Completed,
                })
            }
            SynthesisCallback::Error(kind) => {
                self.current = None;
                let outcome = if kind.is_interruption() {
                    debug!("{} ended by {}", utterance, kind);
                    PlaybackOutcome::Interrupted
                } else {
                    error!("Speech output error for {}: {}", utterance, kind);
                    PlaybackOutcome::Failed(kind.to_string())
                };
                Some(PlaybackEvent::Ended { utterance, outcome })
            }
        }
    }

    /// New settings apply from the next `speak()`.
    /// An update without a voice name keeps the current voice.
    pub fn update_settings(&mut self, mut settings: VoiceSettings) {
        if settings.voice.is_none() {
            settings.voice = self.settings.voice.take();
        }
        debug!(
            "voice settings: pitch={} rate={} volume={} voice={:?}",
            settings.pitch, settings.rate, settings.volume, settings.voice
        );
        self.settings = settings;
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<UtteranceId> {
        self.current
    }
}
