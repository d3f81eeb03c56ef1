//! Energy-based utterance segmentation
//!
//! Blocks whose RMS level exceeds the threshold count as speech. An
//! utterance is complete once enough speech has been followed by enough
//! silence. One block of pre-roll is kept so soft word onsets survive.

use crate::config::RecognizerConfig;

/// Cap on a single utterance (in seconds) before it is cut
const MAX_UTTERANCE_SECS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterSettings {
    pub energy_threshold: f32,
    pub min_speech_samples: usize,
    pub trailing_silence_samples: usize,
    pub max_samples: usize,
}

impl SegmenterSettings {
    pub fn from_config(config: &RecognizerConfig) -> Self {
        let per_ms = |ms: u64| (ms as usize * config.sample_rate as usize) / 1000;
        Self {
            energy_threshold: config.energy_threshold,
            min_speech_samples: per_ms(config.min_speech_ms),
            trailing_silence_samples: per_ms(config.trailing_silence_ms),
            max_samples: MAX_UTTERANCE_SECS * config.sample_rate as usize,
        }
    }
}

/// Accumulates audio blocks into complete utterances
#[derive(Debug)]
pub struct UtteranceSegmenter {
    settings: SegmenterSettings,
    preroll: Vec<i16>,
    buffer: Vec<i16>,
    in_speech: bool,
    speech_samples: usize,
    silence_samples: usize,
}

impl UtteranceSegmenter {
    pub fn new(settings: SegmenterSettings) -> Self {
        Self {
            settings,
            preroll: Vec::new(),
            buffer: Vec::new(),
            in_speech: false,
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    /// Feed one block; returns the utterance once it is complete
    pub fn push(&mut self, block: &[i16]) -> Option<Vec<i16>> {
        let is_speech = rms(block) > self.settings.energy_threshold;

        if !self.in_speech {
            if is_speech {
                self.in_speech = true;
                self.buffer = std::mem::take(&mut self.preroll);
                self.buffer.extend_from_slice(block);
                self.speech_samples = block.len();
                self.silence_samples = 0;
            } else {
                self.preroll.clear();
                self.preroll.extend_from_slice(block);
            }
            return None;
        }

        self.buffer.extend_from_slice(block);
        if is_speech {
            self.speech_samples += block.len();
            self.silence_samples = 0;
        } else {
            self.silence_samples += block.len();
        }

        if self.buffer.len() >= self.settings.max_samples {
            return Some(self.take());
        }

        if self.silence_samples >= self.settings.trailing_silence_samples {
            if self.speech_samples >= self.settings.min_speech_samples {
                return Some(self.take());
            }
            // too short to be a word
            self.reset();
        }
        None
    }

    /// Return whatever speech is pending, if long enough to decode
    pub fn flush(&mut self) -> Option<Vec<i16>> {
        let pending = self.in_speech && self.speech_samples >= self.settings.min_speech_samples;
        let utterance = pending.then(|| self.take());
        self.reset();
        utterance
    }

    pub fn reset(&mut self) {
        self.preroll.clear();
        self.buffer.clear();
        self.in_speech = false;
        self.speech_samples = 0;
        self.silence_samples = 0;
    }

    fn take(&mut self) -> Vec<i16> {
        let utterance = std::mem::take(&mut self.buffer);
        self.reset();
        utterance
    }
}

/// RMS level of a block, normalized to [0, 1]
#[allow(clippy::cast_precision_loss)]
fn rms(block: &[i16]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f32 = block
        .iter()
        .map(|&s| {
            let s = f32::from(s) / 32768.0;
            s * s
        })
        .sum();
    (sum / block.len() as f32).sqrt()
}
