//! Substring-based intent classification
//!
//! Rule order is fixed: sleep, continuous move, single-step move, stop,
//! then chat. Sleep must win over everything so that "sonu sleep" is never
//! read as a command or forwarded to the brain.

use serde::{Deserialize, Serialize};

use crate::config::{DirectionWords, PhraseConfig};

use super::utterance::{normalize, ListenMode, Utterance};

/// Direction the robot can be driven in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    /// Priority used when one utterance names several directions
    pub const PRIORITY: [Direction; 4] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// What the speaker wants, produced once per utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Wake,
    Sleep,
    Move { direction: Direction, continuous: bool },
    Stop,
    Chat(String),
    Unknown,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Wake => write!(f, "wake"),
            Intent::Sleep => write!(f, "sleep"),
            Intent::Move { direction, continuous: true } => write!(f, "move {direction} (continuous)"),
            Intent::Move { direction, continuous: false } => write!(f, "move {direction}"),
            Intent::Stop => write!(f, "stop"),
            Intent::Chat(_) => write!(f, "chat"),
            Intent::Unknown => write!(f, "unknown"),
        }
    }
}

/// Normalized phrase lists the classifier matches against
#[derive(Debug, Clone)]
pub struct PhraseBook {
    wake: Vec<String>,
    sleep: Vec<String>,
    stop: Vec<String>,
    noise: Vec<String>,
    moves: Vec<(Direction, Vec<String>)>,
    continuous: Vec<(Direction, Vec<String>)>,
}

impl PhraseBook {
    /// Build a phrase book, normalizing every configured phrase
    pub fn from_config(config: &PhraseConfig) -> Self {
        Self {
            wake: normalize_all(&config.wake),
            sleep: normalize_all(&config.sleep),
            stop: normalize_all(&config.stop),
            noise: normalize_all(&config.noise),
            moves: by_direction(&config.moves),
            continuous: by_direction(&config.continuous),
        }
    }

    /// Wake phrases, used as the restricted grammar while asleep
    pub fn wake_phrases(&self) -> &[String] {
        &self.wake
    }

    /// Turn an utterance into an intent for the dispatcher.
    ///
    /// While listening for the wake phrase anything else is ignored
    /// (`None`). In command mode a wake phrase still wins over the full
    /// classification.
    pub fn interpret(&self, utterance: &Utterance) -> Option<Intent> {
        let wake = contains_any(&utterance.text, &self.wake);
        match utterance.mode {
            ListenMode::Wake => wake.then_some(Intent::Wake),
            ListenMode::Command if wake => Some(Intent::Wake),
            ListenMode::Command => Some(self.classify(&utterance.text)),
        }
    }

    /// Classify text into an intent. Pure and deterministic.
    pub fn classify(&self, text: &str) -> Intent {
        let text = normalize(text);

        if self.is_noise(&text) {
            Intent::Unknown
        } else if contains_any(&text, &self.sleep) {
            Intent::Sleep
        } else if let Some(direction) = first_direction(&text, &self.continuous) {
            Intent::Move { direction, continuous: true }
        } else if let Some(direction) = first_direction(&text, &self.moves) {
            Intent::Move { direction, continuous: false }
        } else if contains_any(&text, &self.stop) {
            Intent::Stop
        } else {
            Intent::Chat(text)
        }
    }

    /// Empty text or nothing but recognizer filler tokens
    fn is_noise(&self, text: &str) -> bool {
        text.split_whitespace()
            .all(|word| self.noise.iter().any(|noise| noise == word))
    }
}

fn normalize_all(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|phrase| normalize(phrase))
        .filter(|phrase| !phrase.is_empty())
        .collect()
}

fn by_direction(words: &DirectionWords) -> Vec<(Direction, Vec<String>)> {
    Direction::PRIORITY
        .iter()
        .map(|&direction| (direction, normalize_all(words.for_direction(direction))))
        .collect()
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase.as_str()))
}

fn first_direction(text: &str, table: &[(Direction, Vec<String>)]) -> Option<Direction> {
    table
        .iter()
        .find(|(_, phrases)| contains_any(text, phrases))
        .map(|(direction, _)| *direction)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn book() -> PhraseBook {
        PhraseBook::from_config(&PhraseConfig::default())
    }

    fn step(direction: Direction) -> Intent {
        Intent::Move { direction, continuous: false }
    }

    fn continuous(direction: Direction) -> Intent {
        Intent::Move { direction, continuous: true }
    }

    #[test]
    fn test_sleep_preempts_movement() {
        let book = book();
        assert_eq!(book.classify("sonu sleep forward"), Intent::Sleep);
        assert_eq!(book.classify("go to sleep and stop"), Intent::Sleep);
        assert_eq!(book.classify("Sleep now, then continue left"), Intent::Sleep);
    }

    #[test]
    fn test_continuous_moves() {
        let book = book();
        assert_eq!(book.classify("continue moving forward"), continuous(Direction::Forward));
        assert_eq!(book.classify("continue forward"), continuous(Direction::Forward));
        assert_eq!(book.classify("continue moving back"), continuous(Direction::Backward));
        assert_eq!(book.classify("continue backward please"), continuous(Direction::Backward));
        assert_eq!(book.classify("continue left"), continuous(Direction::Left));
        assert_eq!(book.classify("continue right"), continuous(Direction::Right));
    }

    #[test]
    fn test_movement_words_outrank_stop() {
        let book = book();
        assert_eq!(book.classify("stop"), Intent::Stop);
        assert_eq!(book.classify("please stop now"), Intent::Stop);
        assert_eq!(book.classify("stop moving forward"), step(Direction::Forward));
        assert_eq!(book.classify("stop and turn left"), step(Direction::Left));
    }

    #[test]
    fn test_single_steps() {
        let book = book();
        assert_eq!(book.classify("forward"), step(Direction::Forward));
        assert_eq!(book.classify("go back"), step(Direction::Backward));
        assert_eq!(book.classify("backward"), step(Direction::Backward));
        assert_eq!(book.classify("turn left"), step(Direction::Left));
        assert_eq!(book.classify("turn right"), step(Direction::Right));
    }

    #[test]
    fn test_direction_priority_on_ties() {
        let book = book();
        assert_eq!(book.classify("left or forward"), step(Direction::Forward));
        assert_eq!(book.classify("right then back"), step(Direction::Backward));
        assert_eq!(book.classify("right then left"), step(Direction::Left));
    }

    #[test]
    fn test_unmatched_text_is_chat() {
        let book = book();
        assert_eq!(
            book.classify("What is your NAME"),
            Intent::Chat("what is your name".to_string())
        );
    }

    #[test]
    fn test_noise_is_unknown() {
        let book = book();
        assert_eq!(book.classify("[unk]"), Intent::Unknown);
        assert_eq!(book.classify("um uh"), Intent::Unknown);
        assert_eq!(book.classify(""), Intent::Unknown);
    }

    #[test]
    fn test_interpret_while_asleep_only_hears_wake() {
        let book = book();
        let timeout = Duration::from_secs(6);

        let wake = Utterance::new("hey sonu", ListenMode::Wake, timeout).unwrap();
        assert_eq!(book.interpret(&wake), Some(Intent::Wake));

        let other = Utterance::new("forward", ListenMode::Wake, timeout).unwrap();
        assert_eq!(book.interpret(&other), None);
    }

    #[test]
    fn test_interpret_wake_wins_when_awake() {
        let book = book();
        let timeout = Duration::from_secs(7);

        let wake = Utterance::new("hey sonu forward", ListenMode::Command, timeout).unwrap();
        assert_eq!(book.interpret(&wake), Some(Intent::Wake));

        let command = Utterance::new("forward", ListenMode::Command, timeout).unwrap();
        assert_eq!(book.interpret(&command), Some(step(Direction::Forward)));
    }

    #[test]
    fn test_configured_phrases_are_normalized() {
        let mut config = PhraseConfig::default();
        config.wake = vec!["  Hey ROBOT ".to_string(), String::new()];
        let book = PhraseBook::from_config(&config);

        assert_eq!(book.wake_phrases(), ["hey robot".to_string()]);
        let timeout = Duration::from_secs(6);
        let heard = Utterance::new("Hey, robot!", ListenMode::Wake, timeout).unwrap();
        assert_eq!(book.interpret(&heard), Some(Intent::Wake));
        let heard = Utterance::new("hey sonu", ListenMode::Wake, timeout).unwrap();
        assert_eq!(book.interpret(&heard), None);
    }
}
