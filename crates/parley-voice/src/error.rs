//! Error types for the Parley voice orchestrator

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors surfaced by the turn-taking orchestrator.
///
/// None of these are fatal: the coordinator reports them as notices and the
/// call can always be ended with `EndCall`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    /// The input engine could not be (re)started; the call stays active.
    #[error("Recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Speech output error: {0}")]
    Synthesis(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl VoiceError {
    /// Recoverable errors leave the call active so the user can retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VoiceError::EngineUnavailable(_) | VoiceError::Recognition(_) | VoiceError::Backend(_)
        )
    }
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        VoiceError::Http(err.to_string())
    }
}

/// Synchronous failure of an engine `start`/`speak` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine is already running. Always swallowed by the sessions.
    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl From<EngineError> for VoiceError {
    fn from(err: EngineError) -> Self {
        VoiceError::EngineUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_unavailable() {
        let err: VoiceError = EngineError::Unavailable("mic busy".into()).into();
        assert_eq!(
            err,
            VoiceError::EngineUnavailable("engine unavailable: mic busy".into())
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn config_errors_are_not_recoverable() {
        assert!(!VoiceError::Config("bad".into()).is_recoverable());
    }
}
