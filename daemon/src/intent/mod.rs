//! Intent classification for recognized speech
//!
//! Maps normalized utterances to the intents the dispatcher acts on:
//! - Wake / Sleep: phrase lists, wake checked before everything else
//! - Move: single steps or continuous drives in one of four directions
//! - Stop, Chat, Unknown

mod classifier;
mod utterance;

pub use classifier::{Direction, Intent, PhraseBook};
pub use utterance::{normalize, ListenMode, Utterance};
