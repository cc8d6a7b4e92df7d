//! The single internal event stream consumed by the turn coordinator.
//!
//! Engine callbacks, timer fires, backend replies and user commands all
//! arrive as one [`VoiceEvent`] enum on one channel, so the state machine
//! has exactly one dispatch point.

use crate::engine::{
    RecognitionCallback, RecognitionErrorKind, RecognitionResult, SynthesisCallback,
    SynthesisErrorKind, UtteranceId,
};
use crate::error::{VoiceError, VoiceResult};
use crate::voice::VoiceSettings;
use tokio::sync::mpsc;
use tracing::debug;

/// Commands issued by the user (or the UI) to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum CallCommand {
    StartCall,
    EndCall,
    ToggleMute,
    /// Cancel the reply currently playing and go back to listening.
    StopSpeaking,
    /// Commit the accumulated utterance now instead of waiting for silence.
    ForceCommit,
    UpdateVoiceSettings(VoiceSettings),
    /// End any call and stop the coordinator loop.
    Shutdown,
}

/// Which one-shot timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    SilenceCommit,
    RecognitionRestart,
    CallStart,
    ListenResume,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Command(CallCommand),
    Recognition(RecognitionCallback),
    Synthesis {
        utterance: UtteranceId,
        callback: SynthesisCallback,
    },
    Timer {
        kind: TimerKind,
        generation: u64,
    },
    Backend {
        turn: u64,
        reply: VoiceResult<String>,
    },
}

/// Cloneable sink that engines (and the coordinator's own timers) use to post
/// events.
#[derive(Debug, Clone)]
pub struct EngineEvents {
    tx: mpsc::UnboundedSender<VoiceEvent>,
}

impl EngineEvents {
    /// Post an event. Returns false once the coordinator is gone.
    pub fn post(&self, event: VoiceEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("voice event dropped, coordinator stopped: {:?}", e.0);
                false
            }
        }
    }

    pub fn recognition_started(&self) -> bool {
        self.post(VoiceEvent::Recognition(RecognitionCallback::Started))
    }

    pub fn recognition_ended(&self) -> bool {
        self.post(VoiceEvent::Recognition(RecognitionCallback::Ended))
    }

    pub fn recognition_result(&self, result_index: usize, results: Vec<RecognitionResult>) -> bool {
        self.post(VoiceEvent::Recognition(RecognitionCallback::Result {
            result_index,
            results,
        }))
    }

    pub fn recognition_error(&self, kind: RecognitionErrorKind) -> bool {
        self.post(VoiceEvent::Recognition(RecognitionCallback::Error(kind)))
    }

    pub fn synthesis_started(&self, utterance: UtteranceId) -> bool {
        self.post(VoiceEvent::Synthesis {
            utterance,
            callback: SynthesisCallback::Started,
        })
    }

    pub fn synthesis_ended(&self, utterance: UtteranceId) -> bool {
        self.post(VoiceEvent::Synthesis {
            utterance,
            callback: SynthesisCallback::Ended,
        })
    }

    pub fn synthesis_error(&self, utterance: UtteranceId, kind: SynthesisErrorKind) -> bool {
        self.post(VoiceEvent::Synthesis {
            utterance,
            callback: SynthesisCallback::Error(kind),
        })
    }

    /// Send a user command; fails when the coordinator has stopped.
    pub fn command(&self, command: CallCommand) -> VoiceResult<()> {
        self.tx
            .send(VoiceEvent::Command(command))
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }
}

/// Owns both ends of the coordinator channel until the coordinator is built.
///
/// Create the bus first, hand [`EventBus::events`] to the engines, then pass
/// the bus to [`crate::TurnCoordinator::new`].
pub struct EventBus {
    events: EngineEvents,
    rx: mpsc::UnboundedReceiver<VoiceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            events: EngineEvents { tx },
            rx,
        }
    }

    pub fn events(&self) -> EngineEvents {
        self.events.clone()
    }

    pub(crate) fn split(self) -> (EngineEvents, mpsc::UnboundedReceiver<VoiceEvent>) {
        (self.events, self.rx)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_callbacks_arrive_in_order() {
        let bus = EventBus::new();
        let events = bus.events();
        let (_, mut rx) = bus.split();

        events.recognition_started();
        events.recognition_result(0, vec![RecognitionResult::finalized("oi")]);
        events.synthesis_error(UtteranceId(3), SynthesisErrorKind::Canceled);

        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::Recognition(RecognitionCallback::Started)
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            VoiceEvent::Recognition(RecognitionCallback::Result { result_index: 0, .. })
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::Synthesis {
                utterance: UtteranceId(3),
                callback: SynthesisCallback::Error(SynthesisErrorKind::Canceled),
            }
        );
    }

    #[test]
    fn command_fails_after_receiver_dropped() {
        let bus = EventBus::new();
        let events = bus.events();
        drop(bus);
        assert!(matches!(
            events.command(CallCommand::StartCall),
            Err(VoiceError::ChannelSend(_))
        ));
        assert!(!events.recognition_started());
    }
}
