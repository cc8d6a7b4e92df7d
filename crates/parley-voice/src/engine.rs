//! Contracts for the external speech engines.
//!
//! Both engines are black-box asynchronous services. Their synchronous calls
//! (`start`, `stop`, `speak`, `cancel`) only *request* work; outcomes arrive
//! later as callbacks posted through [`crate::event::EngineEvents`].

use crate::error::EngineError;
use crate::voice::{VoiceInfo, VoiceSettings};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// One entry of the input engine's result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Final results are stable; interim results may still be revised.
    pub is_final: bool,
    pub transcript: String,
}

impl RecognitionResult {
    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            is_final: true,
            transcript: transcript.into(),
        }
    }

    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            is_final: false,
            transcript: transcript.into(),
        }
    }
}

/// Callbacks of the continuous input engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionCallback {
    Started,
    Ended,
    /// `results` is the engine's whole result list for the current run;
    /// `result_index` is the first entry not yet delivered.
    Result {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    Error(RecognitionErrorKind),
}

/// Error kinds reported by the input engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionErrorKind {
    /// Normal silence, not a failure.
    NoSpeech,
    Aborted,
    Network,
    NotAllowed,
    AudioCapture,
    ServiceNotAllowed,
    LanguageNotSupported,
    Other(String),
}

impl RecognitionErrorKind {
    /// Errors that end the engine run and mark the session not-listening.
    pub fn stops_listening(&self) -> bool {
        matches!(self, RecognitionErrorKind::Aborted | RecognitionErrorKind::Network)
    }
}

impl FromStr for RecognitionErrorKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "no-speech" => RecognitionErrorKind::NoSpeech,
            "aborted" => RecognitionErrorKind::Aborted,
            "network" => RecognitionErrorKind::Network,
            "not-allowed" => RecognitionErrorKind::NotAllowed,
            "audio-capture" => RecognitionErrorKind::AudioCapture,
            "service-not-allowed" => RecognitionErrorKind::ServiceNotAllowed,
            "language-not-supported" => RecognitionErrorKind::LanguageNotSupported,
            other => RecognitionErrorKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecognitionErrorKind::NoSpeech => "no-speech",
            RecognitionErrorKind::Aborted => "aborted",
            RecognitionErrorKind::Network => "network",
            RecognitionErrorKind::NotAllowed => "not-allowed",
            RecognitionErrorKind::AudioCapture => "audio-capture",
            RecognitionErrorKind::ServiceNotAllowed => "service-not-allowed",
            RecognitionErrorKind::LanguageNotSupported => "language-not-supported",
            RecognitionErrorKind::Other(s) => s,
        };
        f.write_str(name)
    }
}

/// Identifies one `speak()` request so late callbacks can be matched to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance#{}", self.0)
    }
}

/// Callbacks of the output engine for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisCallback {
    Started,
    Ended,
    Error(SynthesisErrorKind),
}

/// Error kinds reported by the output engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisErrorKind {
    Interrupted,
    Canceled,
    AudioBusy,
    AudioHardware,
    Network,
    SynthesisUnavailable,
    SynthesisFailed,
    LanguageUnavailable,
    VoiceUnavailable,
    TextTooLong,
    InvalidArgument,
    NotAllowed,
    Other(String),
}

impl SynthesisErrorKind {
    /// Interruptions are an ordinary way for playback to end.
    pub fn is_interruption(&self) -> bool {
        matches!(self, SynthesisErrorKind::Interrupted | SynthesisErrorKind::Canceled)
    }
}

impl FromStr for SynthesisErrorKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "interrupted" => SynthesisErrorKind::Interrupted,
            "canceled" => SynthesisErrorKind::Canceled,
            "audio-busy" => SynthesisErrorKind::AudioBusy,
            "audio-hardware" => SynthesisErrorKind::AudioHardware,
            "network" => SynthesisErrorKind::Network,
            "synthesis-unavailable" => SynthesisErrorKind::SynthesisUnavailable,
            "synthesis-failed" => SynthesisErrorKind::SynthesisFailed,
            "language-unavailable" => SynthesisErrorKind::LanguageUnavailable,
            "voice-unavailable" => SynthesisErrorKind::VoiceUnavailable,
            "text-too-long" => SynthesisErrorKind::TextTooLong,
            "invalid-argument" => SynthesisErrorKind::InvalidArgument,
            "not-allowed" => SynthesisErrorKind::NotAllowed,
            other => SynthesisErrorKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for SynthesisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SynthesisErrorKind::Interrupted => "interrupted",
            SynthesisErrorKind::Canceled => "canceled",
            SynthesisErrorKind::AudioBusy => "audio-busy",
            SynthesisErrorKind::AudioHardware => "audio-hardware",
            SynthesisErrorKind::Network => "network",
            SynthesisErrorKind::SynthesisUnavailable => "synthesis-unavailable",
            SynthesisErrorKind::SynthesisFailed => "synthesis-failed",
            SynthesisErrorKind::LanguageUnavailable => "language-unavailable",
            SynthesisErrorKind::VoiceUnavailable => "voice-unavailable",
            SynthesisErrorKind::TextTooLong => "text-too-long",
            SynthesisErrorKind::InvalidArgument => "invalid-argument",
            SynthesisErrorKind::NotAllowed => "not-allowed",
            SynthesisErrorKind::Other(s) => s,
        };
        f.write_str(name)
    }
}

/// Continuous speech-to-text engine. Implement for a platform recognizer or a
/// streaming STT service.
///
/// Engines without monotonic `result_index` semantics need a shim that
/// produces them before being plugged in here.
pub trait RecognitionEngine: Send {
    /// Request the engine to start. Reports `Started` through the event sink
    /// once audio is flowing.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Request the engine to stop. Reports `Ended` through the event sink.
    fn stop(&mut self);
}

/// Text-to-speech engine. Implement for a platform synthesizer or a TTS API.
pub trait SynthesisEngine: Send {
    /// Start playback of `text`. Callbacks must carry `utterance`.
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<(), EngineError>;

    /// Stop the current playback immediately.
    fn cancel(&mut self);

    /// Voices this engine can speak with.
    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_error_names_round_trip_through_display() {
        for name in ["no-speech", "aborted", "network", "audio-capture", "weird"] {
            let kind: RecognitionErrorKind = name.parse().unwrap();
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn only_aborted_and_network_stop_listening() {
        assert!(RecognitionErrorKind::Aborted.stops_listening());
        assert!(RecognitionErrorKind::Network.stops_listening());
        assert!(!RecognitionErrorKind::NoSpeech.stops_listening());
        assert!(!RecognitionErrorKind::AudioCapture.stops_listening());
    }

    #[test]
    fn interrupted_and_canceled_are_interruptions() {
        let interrupted: SynthesisErrorKind = "interrupted".parse().unwrap();
        let canceled: SynthesisErrorKind = "canceled".parse().unwrap();
        let busy: SynthesisErrorKind = "audio-busy".parse().unwrap();
        assert!(interrupted.is_interruption());
        assert!(canceled.is_interruption());
        assert!(!busy.is_interruption());
    }
}
