//! Listening with a timeout over the live audio stream
//!
//! The capture callback pushes blocks into a bounded channel through a
//! [`SampleSink`]; the sink drops audio whenever nobody is listening, so
//! the robot never transcribes its own voice. `listen` drains the channel,
//! segments utterances, and transcribes them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::RecognizerConfig;
use crate::intent::normalize;

use super::segmenter::{SegmenterSettings, UtteranceSegmenter};
use super::transcriber::Transcriber;

/// Blocks buffered between the capture thread and the recognizer
const SAMPLE_QUEUE: usize = 64;

/// How long a transcription may run past the listen deadline
const DECODE_GRACE: Duration = Duration::from_secs(2);

/// Source of recognized text
#[async_trait]
pub trait Recognizer: Send {
    /// Wait up to `timeout` for an utterance.
    ///
    /// Returns lower-cased, trimmed text, or `None` on timeout or silence.
    /// With `restrict`, only text containing one of the phrases is returned.
    async fn listen(&mut self, timeout: Duration, restrict: Option<&[String]>) -> Option<String>;
}

/// Producer half handed to the capture callback
#[derive(Clone)]
pub struct SampleSink {
    tx: mpsc::Sender<Vec<i16>>,
    listening: Arc<AtomicBool>,
}

impl SampleSink {
    /// Forward a block without blocking; dropped when not listening or full
    pub fn push(&self, samples: &[i16]) {
        if !self.listening.load(Ordering::Relaxed) {
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(samples.to_vec()) {
            trace!("sample queue full, dropping block");
        }
    }
}

/// Recognizer fed by a live sample stream and an external transcriber
pub struct StreamingRecognizer {
    samples_rx: mpsc::Receiver<Vec<i16>>,
    listening: Arc<AtomicBool>,
    segmenter: UtteranceSegmenter,
    transcriber: Arc<dyn Transcriber>,
    sample_rate: u32,
}

impl StreamingRecognizer {
    /// Create the recognizer and the sink the capture callback writes to
    pub fn new(config: &RecognizerConfig, transcriber: Arc<dyn Transcriber>) -> (Self, SampleSink) {
        let (tx, samples_rx) = mpsc::channel(SAMPLE_QUEUE);
        let listening = Arc::new(AtomicBool::new(false));

        let recognizer = Self {
            samples_rx,
            listening: Arc::clone(&listening),
            segmenter: UtteranceSegmenter::new(SegmenterSettings::from_config(config)),
            transcriber,
            sample_rate: config.sample_rate,
        };
        (recognizer, SampleSink { tx, listening })
    }

    async fn capture(&mut self, deadline: Instant, restrict: Option<&[String]>) -> Option<String> {
        loop {
            match tokio::time::timeout_at(deadline, self.samples_rx.recv()).await {
                Ok(Some(block)) => {
                    if let Some(segment) = self.segmenter.push(&block) {
                        let transcriber = self.transcriber.as_ref();
                        if let Some(text) = decode_until(
                            deadline + DECODE_GRACE,
                            transcriber,
                            self.sample_rate,
                            &segment,
                            restrict,
                        )
                        .await
                        {
                            return Some(text);
                        }
                    }
                }
                Ok(None) => {
                    warn!("audio capture closed");
                    tokio::time::sleep_until(deadline).await;
                    return None;
                }
                Err(_) => {
                    let segment = self.segmenter.flush()?;
                    let transcriber = self.transcriber.as_ref();
                    return decode_until(
                        deadline + DECODE_GRACE,
                        transcriber,
                        self.sample_rate,
                        &segment,
                        restrict,
                    )
                    .await;
                }
            }
        }
    }
}

#[async_trait]
impl Recognizer for StreamingRecognizer {
    async fn listen(&mut self, timeout: Duration, restrict: Option<&[String]>) -> Option<String> {
        // audio queued while we were speaking or driving is stale
        while self.samples_rx.try_recv().is_ok() {}
        self.segmenter.reset();

        let deadline = Instant::now() + timeout;
        self.listening.store(true, Ordering::SeqCst);
        let text = self.capture(deadline, restrict).await;
        self.listening.store(false, Ordering::SeqCst);
        text
    }
}

/// [`decode`], giving up at `limit`
async fn decode_until(
    limit: Instant,
    transcriber: &dyn Transcriber,
    sample_rate: u32,
    segment: &[i16],
    restrict: Option<&[String]>,
) -> Option<String> {
    let decoding = decode(transcriber, sample_rate, segment, restrict);
    match tokio::time::timeout_at(limit, decoding).await {
        Ok(text) => text,
        Err(_) => {
            warn!("transcription overran the listen deadline, dropping it");
            None
        }
    }
}

/// Transcribe one segment, applying the phrase restriction
async fn decode(
    transcriber: &dyn Transcriber,
    sample_rate: u32,
    segment: &[i16],
    restrict: Option<&[String]>,
) -> Option<String> {
    let raw = match transcriber.transcribe(segment, sample_rate, restrict).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "transcription failed");
            return None;
        }
    };

    let text = normalize(&raw);
    if text.is_empty() {
        return None;
    }

    if let Some(phrases) = restrict {
        if !phrases.iter().any(|phrase| text.contains(phrase.as_str())) {
            debug!(heard = %text, "ignored outside restricted phrases");
            return None;
        }
    }

    info!(heard = %text, "utterance recognized");
    Some(text)
}
