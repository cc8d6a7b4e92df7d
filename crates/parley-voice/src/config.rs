//! Orchestrator configuration loaded from the environment (`.env` in the demo).
//!
//! Timing defaults follow the conversational feel we want: a longer silence
//! window during hands-free calls than in push-to-talk chat, a short delay
//! before the first listen, and a quick restart after an unexpected engine end.

use crate::error::{VoiceError, VoiceResult};
use crate::voice::{VoiceSettings, DEFAULT_PREFERRED_VOICES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat uses the shorter silence window; call mode the longer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationMode {
    Chat,
    #[default]
    Call,
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "pt-BR".to_string()
}

fn default_chat_silence_ms() -> u64 {
    1500
}

fn default_call_silence_ms() -> u64 {
    2000
}

fn default_call_start_delay_ms() -> u64 {
    500
}

fn default_resume_delay_ms() -> u64 {
    300
}

fn default_restart_delay_ms() -> u64 {
    100
}

fn default_barge_in_min_chars() -> usize {
    1
}

fn default_preferred_voices() -> Vec<String> {
    DEFAULT_PREFERRED_VOICES.iter().map(|s| s.to_string()).collect()
}

/// Orchestrator configuration.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | PARLEY_LANGUAGE | pt-BR | Recognition language and voice preference. |
/// | PARLEY_MODE | call | "chat" \| "call", selects the silence window. |
/// | PARLEY_CHAT_SILENCE_MS | 1500 | Silence before commit in chat mode. |
/// | PARLEY_CALL_SILENCE_MS | 2000 | Silence before commit in call mode. |
/// | PARLEY_CALL_START_DELAY_MS | 500 | StartCall → first recognition start. |
/// | PARLEY_RESUME_DELAY_MS | 300 | Reply finished → resume listening. |
/// | PARLEY_RESTART_DELAY_MS | 100 | Unexpected engine end → restart. |
/// | PARLEY_RESTART_ON_COMMIT | true | Stop/start the input engine after each commit. |
/// | PARLEY_BARGE_IN_MIN_CHARS | 1 | Interim length that counts as the user talking over a reply. |
/// | PARLEY_VOICE_ENABLED | true | When false, replies complete without audio. |
/// | PARLEY_VOICE_PITCH / _RATE / _VOLUME | 1.0 / 0.95 / 1.0 | Synthesis parameters. |
/// | PARLEY_VOICE_NAME | unset | Explicit output voice. |
/// | PARLEY_CHAT_URL | unset | Chat endpoint for the HTTP backend. |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub mode: ConversationMode,
    #[serde(default = "default_chat_silence_ms")]
    pub chat_silence_ms: u64,
    #[serde(default = "default_call_silence_ms")]
    pub call_silence_ms: u64,
    #[serde(default = "default_call_start_delay_ms")]
    pub call_start_delay_ms: u64,
    #[serde(default = "default_resume_delay_ms")]
    pub resume_delay_ms: u64,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Continuous engines keep their whole result history; a stop/start
    /// cycle after each commit clears it.
    #[serde(default = "default_true")]
    pub restart_on_commit: bool,
    /// Trimmed interim length at or above which speech during a reply
    /// interrupts it. 1 means any non-empty interim. An update carrying only
    /// final text does not interrupt; it is committed after the reply.
    #[serde(default = "default_barge_in_min_chars")]
    pub barge_in_min_chars: usize,
    #[serde(default = "default_true")]
    pub voice_enabled: bool,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default = "default_preferred_voices")]
    pub preferred_voices: Vec<String>,
    #[serde(default)]
    pub chat_url: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            mode: ConversationMode::default(),
            chat_silence_ms: default_chat_silence_ms(),
            call_silence_ms: default_call_silence_ms(),
            call_start_delay_ms: default_call_start_delay_ms(),
            resume_delay_ms: default_resume_delay_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            restart_on_commit: true,
            barge_in_min_chars: default_barge_in_min_chars(),
            voice_enabled: true,
            voice: VoiceSettings::default(),
            preferred_voices: default_preferred_voices(),
            chat_url: None,
        }
    }
}

impl VoiceConfig {
    /// Load from environment. Unset or invalid values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let voice = VoiceSettings {
            pitch: env_f32("PARLEY_VOICE_PITCH", defaults.voice.pitch).clamp(0.0, 2.0),
            rate: env_f32("PARLEY_VOICE_RATE", defaults.voice.rate).clamp(0.1, 10.0),
            volume: env_f32("PARLEY_VOICE_VOLUME", defaults.voice.volume).clamp(0.0, 1.0),
            voice: env_opt_string("PARLEY_VOICE_NAME"),
        };
        Self {
            language: env_opt_string("PARLEY_LANGUAGE").unwrap_or(defaults.language),
            mode: env_mode(),
            chat_silence_ms: env_millis("PARLEY_CHAT_SILENCE_MS", defaults.chat_silence_ms),
            call_silence_ms: env_millis("PARLEY_CALL_SILENCE_MS", defaults.call_silence_ms),
            call_start_delay_ms: env_millis(
                "PARLEY_CALL_START_DELAY_MS",
                defaults.call_start_delay_ms,
            ),
            resume_delay_ms: env_millis("PARLEY_RESUME_DELAY_MS", defaults.resume_delay_ms),
            restart_delay_ms: env_millis("PARLEY_RESTART_DELAY_MS", defaults.restart_delay_ms),
            restart_on_commit: env_bool("PARLEY_RESTART_ON_COMMIT", true),
            barge_in_min_chars: env_opt_string("PARLEY_BARGE_IN_MIN_CHARS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.barge_in_min_chars)
                .max(1),
            voice_enabled: env_bool("PARLEY_VOICE_ENABLED", true),
            voice,
            preferred_voices: defaults.preferred_voices,
            chat_url: env_opt_string("PARLEY_CHAT_URL"),
        }
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> VoiceResult<()> {
        if self.chat_silence_ms == 0 || self.call_silence_ms == 0 {
            return Err(VoiceError::Config(
                "silence window must be greater than zero".to_string(),
            ));
        }
        if self.barge_in_min_chars == 0 {
            return Err(VoiceError::Config(
                "barge_in_min_chars must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.voice.volume) {
            return Err(VoiceError::Config(format!(
                "voice volume must be within 0.0..=1.0, got {}",
                self.voice.volume
            )));
        }
        if !(0.1..=10.0).contains(&self.voice.rate) {
            return Err(VoiceError::Config(format!(
                "voice rate must be within 0.1..=10.0, got {}",
                self.voice.rate
            )));
        }
        if !(0.0..=2.0).contains(&self.voice.pitch) {
            return Err(VoiceError::Config(format!(
                "voice pitch must be within 0.0..=2.0, got {}",
                self.voice.pitch
            )));
        }
        if self.language.trim().is_empty() {
            return Err(VoiceError::Config("language must not be empty".to_string()));
        }
        Ok(())
    }

    /// Silence window for the configured mode.
    pub fn silence_window(&self) -> Duration {
        match self.mode {
            ConversationMode::Chat => Duration::from_millis(self.chat_silence_ms),
            ConversationMode::Call => Duration::from_millis(self.call_silence_ms),
        }
    }

    pub fn call_start_delay(&self) -> Duration {
        Duration::from_millis(self.call_start_delay_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                default
            } else {
                v.eq_ignore_ascii_case("true") || v == "1"
            }
        }
        Err(_) => default,
    }
}

fn env_millis(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse::<f32>().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_mode() -> ConversationMode {
    match std::env::var("PARLEY_MODE") {
        Ok(v) if v.trim().eq_ignore_ascii_case("chat") => ConversationMode::Chat,
        _ => ConversationMode::Call,
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_conversation_timing() {
        let c = VoiceConfig::default();
        assert_eq!(c.language, "pt-BR");
        assert_eq!(c.silence_window(), Duration::from_millis(2000));
        assert_eq!(c.call_start_delay(), Duration::from_millis(500));
        assert_eq!(c.resume_delay(), Duration::from_millis(300));
        assert_eq!(c.restart_delay(), Duration::from_millis(100));
        assert!(c.restart_on_commit);
        assert!((c.voice.rate - 0.95).abs() < 1e-6);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn chat_mode_uses_shorter_window() {
        let c = VoiceConfig {
            mode: ConversationMode::Chat,
            ..Default::default()
        };
        assert_eq!(c.silence_window(), Duration::from_millis(1500));
    }

    #[test]
    fn validate_rejects_zero_window_and_loud_volume() {
        let zero = VoiceConfig {
            call_silence_ms: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(VoiceError::Config(_))));

        let mut loud = VoiceConfig::default();
        loud.voice.volume = 1.5;
        assert!(matches!(loud.validate(), Err(VoiceError::Config(_))));
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let c: VoiceConfig =
            serde_json::from_str(r#"{ "mode": "chat", "language": "en-US" }"#).unwrap();
        assert_eq!(c.mode, ConversationMode::Chat);
        assert_eq!(c.language, "en-US");
        assert_eq!(c.call_silence_ms, 2000);
        assert_eq!(c.barge_in_min_chars, 1);
        assert!(c.voice_enabled);
        assert!(!c.preferred_voices.is_empty());
    }
}
