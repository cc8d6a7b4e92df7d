//! Output voice settings and voice selection.

use serde::{Deserialize, Serialize};

/// Preferred voices for Brazilian Portuguese, most natural first.
///
/// "Online (Natural)" voices are the most human-like; the platform voices
/// follow, Google voices last.
pub const DEFAULT_PREFERRED_VOICES: &[&str] = &[
    "Microsoft Francisca Online (Natural)",
    "Microsoft Antonio Online (Natural)",
    "Microsoft Thalita Online (Natural)",
    "Microsoft Daniel",
    "Microsoft Maria",
    "Luciana",
    "Daniel",
    "Google português do Brasil",
    "Google português",
];

/// Parameters passed to the output engine with every `speak`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// 0.0..=2.0, 1.0 is the voice's natural pitch.
    pub pitch: f32,
    /// 0.1..=10.0; slightly below 1.0 reads more clearly.
    pub rate: f32,
    /// 0.0..=1.0
    pub volume: f32,
    /// Voice name; `None` lets the engine use its default.
    pub voice: Option<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            rate: 0.95,
            volume: 1.0,
            voice: None,
        }
    }
}

/// A voice offered by the output engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP-47 tag, e.g. `pt-BR`.
    pub lang: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Pick the output voice.
///
/// Order: explicit name, then the preferred list (case-insensitive substring,
/// in list order), then any "Natural" voice of the language family, the exact
/// language tag, the language family, and finally the first voice offered.
pub fn select_voice<'a>(
    voices: &'a [VoiceInfo],
    preferred: &[String],
    language: &str,
    explicit: Option<&str>,
) -> Option<&'a VoiceInfo> {
    if let Some(name) = explicit {
        if let Some(v) = voices.iter().find(|v| v.name.eq_ignore_ascii_case(name)) {
            return Some(v);
        }
    }

    for wanted in preferred {
        let wanted = wanted.to_lowercase();
        if let Some(v) = voices.iter().find(|v| v.name.to_lowercase().contains(&wanted)) {
            return Some(v);
        }
    }

    let family = language.split('-').next().unwrap_or(language);

    voices
        .iter()
        .find(|v| v.name.contains("Natural") && v.lang.starts_with(family))
        .or_else(|| voices.iter().find(|v| v.lang == language))
        .or_else(|| voices.iter().find(|v| v.lang.starts_with(family)))
        .or_else(|| voices.first())
}
