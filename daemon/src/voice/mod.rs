//! Voice input and output
//!
//! - `capture`: microphone blocks pushed from a dedicated thread
//! - `segmenter`: energy-based utterance boundaries
//! - `recognizer`: listen-with-timeout over captured audio
//! - `transcriber`: speech-to-text endpoint
//! - `speaker`: text-to-speech
//! - `ambience`: idle purring loop, hushed while speaking

mod ambience;
mod capture;
mod recognizer;
mod segmenter;
mod speaker;
mod transcriber;

pub use ambience::{CommandPlayer, HushedSynthesizer, IdleAmbience};
pub use capture::AudioCapture;
pub use recognizer::{Recognizer, StreamingRecognizer};
pub use speaker::{Espeak, Synthesizer};
pub use transcriber::HttpTranscriber;
