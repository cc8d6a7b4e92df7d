//! Transcript accumulation for the current user turn.
//!
//! Final fragments are appended to the utterance and never rewritten; the
//! interim hypothesis is overwritten on every engine update. Both survive
//! engine restarts and are only cleared by [`TranscriptAccumulator::reset`].

/// Buffers finalized speech fragments plus the latest interim hypothesis.
#[derive(Debug, Clone, Default)]
pub struct TranscriptAccumulator {
    utterance: String,
    interim: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a final fragment, space-separated. Returns the full accumulated text.
    ///
    /// Empty (or whitespace-only) fragments are ignored.
    pub fn append_final(&mut self, fragment: &str) -> &str {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return &self.utterance;
        }
        if !self.utterance.is_empty() {
            self.utterance.push(' ');
        }
        self.utterance.push_str(fragment);
        &self.utterance
    }

    /// Replace the interim hypothesis. Does not touch the utterance.
    pub fn set_interim(&mut self, text: &str) {
        self.interim.clear();
        self.interim.push_str(text.trim());
    }

    /// Utterance plus interim text, for live display.
    pub fn snapshot(&self) -> String {
        match (self.utterance.is_empty(), self.interim.is_empty()) {
            (_, true) => self.utterance.clone(),
            (true, false) => self.interim.clone(),
            (false, false) => format!("{} {}", self.utterance, self.interim),
        }
    }

    /// Finalized text of the current turn.
    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    /// True when no final text has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.utterance.trim().is_empty()
    }

    /// Clear both utterance and interim text (after a commit and on call end).
    pub fn reset(&mut self) {
        self.utterance.clear();
        self.interim.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_with_single_space() {
        let mut acc = TranscriptAccumulator::new();
        assert_eq!(acc.append_final("olá"), "olá");
        assert_eq!(acc.append_final(" tudo bem "), "olá tudo bem");
    }

    #[test]
    fn empty_fragment_is_noop() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_final("oi");
        assert_eq!(acc.append_final("   "), "oi");
        assert_eq!(acc.append_final(""), "oi");
    }

    #[test]
    fn interim_does_not_touch_utterance() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_final("bom dia");
        acc.set_interim("como");
        acc.set_interim("como vai");
        assert_eq!(acc.utterance(), "bom dia");
        assert_eq!(acc.snapshot(), "bom dia como vai");
    }

    #[test]
    fn snapshot_without_utterance_is_interim_only() {
        let mut acc = TranscriptAccumulator::new();
        acc.set_interim("alô");
        assert_eq!(acc.snapshot(), "alô");
        assert!(acc.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_final("oi");
        acc.set_interim("tchau");
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.snapshot(), "");
    }
}
