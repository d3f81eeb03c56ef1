//! Normalized recognizer output

use std::time::Duration;

/// Which capture mode an utterance was heard under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Short capture restricted to wake phrases (robot asleep)
    Wake,
    /// Longer open-vocabulary capture (robot awake or moving)
    Command,
}

impl std::fmt::Display for ListenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenMode::Wake => write!(f, "wake"),
            ListenMode::Command => write!(f, "command"),
        }
    }
}

/// One captured utterance, discarded after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Lower-cased text with punctuation stripped and whitespace collapsed
    pub text: String,
    /// Mode the capture ran in
    pub mode: ListenMode,
    /// Timeout the capture ran with
    pub timeout: Duration,
}

impl Utterance {
    /// Normalize raw recognizer text. Returns `None` when nothing is left.
    pub fn new(raw: &str, mode: ListenMode, timeout: Duration) -> Option<Self> {
        let text = normalize(raw);
        if text.is_empty() {
            return None;
        }
        Some(Self { text, mode, timeout })
    }
}

/// Lower-case, drop punctuation (apostrophes survive), collapse whitespace.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
