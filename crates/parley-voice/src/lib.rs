//! # Parley Voice - Turn-Taking Orchestration
//!
//! Coordinates a continuous speech-to-text engine and a text-to-speech engine
//! into one conversational state machine: incremental transcription, silence
//! based commit, barge-in while a reply plays, mute, and recovery when the
//! input engine drops out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Turn Coordinator                          │
//! │  ┌──────────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │ RecognitionSess. │→ │  Transcript  │→ │  Silence Commit  │   │
//! │  │ (auto-restart)   │  │  Accumulator │  │  (last arm wins) │   │
//! │  └──────────────────┘  └──────────────┘  └──────────────────┘   │
//! │         ↑ interim → barge-in                    ↓ commit         │
//! │  ┌──────────────────┐                   ┌──────────────────┐    │
//! │  │ SpeechOutputSess.│←──── reply ───────│ ResponseBackend  │    │
//! │  │ (one utterance)  │                   │  (async task)    │    │
//! │  └──────────────────┘                   └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//!        all callbacks, timer fires and replies → one VoiceEvent channel
//! ```
//!
//! ## Wiring
//!
//! Create an [`EventBus`], build the engines with [`EventBus::events`], then
//! hand everything to [`TurnCoordinator::new`] and spawn
//! [`TurnCoordinator::run`]. Drive the call through the returned
//! [`VoiceHandle`].

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod event;
pub mod placeholder;
pub mod recognition;
pub mod speech_output;
pub mod timer;
pub mod transcript;
pub mod voice;

pub use backend::{EchoBackend, HttpChatBackend, ResponseBackend};
pub use config::{ConversationMode, VoiceConfig};
pub use coordinator::{CoordinatorNotice, TurnCoordinator, TurnState, VoiceHandle, VoiceSnapshot};
pub use engine::{
    RecognitionCallback, RecognitionEngine, RecognitionErrorKind, RecognitionResult,
    SynthesisCallback, SynthesisEngine, SynthesisErrorKind, UtteranceId,
};
pub use error::{EngineError, VoiceError, VoiceResult};
pub use event::{CallCommand, EngineEvents, EventBus, TimerKind, VoiceEvent};
pub use placeholder::{PlaceholderRecognizer, PlaceholderSynthesizer};
pub use recognition::{RecognitionNotice, RecognitionSession};
pub use speech_output::{PlaybackEvent, PlaybackOutcome, SpeechOutputSession};
pub use timer::{OneShotTimer, SilenceCommitTimer};
pub use transcript::TranscriptAccumulator;
pub use voice::{select_voice, VoiceInfo, VoiceSettings, DEFAULT_PREFERRED_VOICES};
