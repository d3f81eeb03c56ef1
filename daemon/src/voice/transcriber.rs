//! Speech-to-text over HTTP
//!
//! Posts one WAV file per utterance to a whisper-compatible endpoint
//! (whisper.cpp `server` or an OpenAI-style transcription API) and reads
//! back `{"text": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::config::RecognizerConfig;

#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("failed to encode audio: {0}")]
    Encode(#[from] hound::Error),

    #[error("transcription endpoint unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("transcription endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed transcription response: {0}")]
    Malformed(String),
}

/// Black-box decoder from audio samples to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Decode mono 16-bit samples. `hint` lists phrases worth biasing towards.
    async fn transcribe(
        &self,
        samples: &[i16],
        sample_rate: u32,
        hint: Option<&[String]>,
    ) -> Result<String, RecognizerError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcriber backed by an HTTP endpoint
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpTranscriber {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RecognizerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &RecognizerConfig) -> Result<Self, RecognizerError> {
        Self::new(
            &config.endpoint,
            &config.model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        samples: &[i16],
        sample_rate: u32,
        hint: Option<&[String]>,
    ) -> Result<String, RecognizerError> {
        let wav = samples_to_wav(samples, sample_rate)?;
        let file = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(phrases) = hint {
            form = form.text("prompt", phrases.join(", "));
        }

        debug!(endpoint = %self.endpoint, samples = samples.len(), "transcribing");
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognizerError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed: TranscriptionResponse = serde_json::from_slice(&body)
            .map_err(|e| RecognizerError::Malformed(e.to_string()))?;
        Ok(parsed.text)
    }
}

/// Encode mono 16-bit samples as a WAV file
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wav_roundtrip_header() {
        let wav = samples_to_wav(&[0, 1000, -1000], 16_000).unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 3);
    }

    #[tokio::test]
    async fn test_transcribe_returns_text() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/inference");
            then.status(200).json_body(json!({"text": " Hey Sonu."}));
        });

        let transcriber =
            HttpTranscriber::new(server.url("/inference"), "base.en", Duration::from_secs(5))
                .unwrap();
        let hint = vec!["hey sonu".to_string(), "hey son".to_string()];
        let text = transcriber
            .transcribe(&[0; 1600], 16_000, Some(hint.as_slice()))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(text, " Hey Sonu.");
    }

    #[tokio::test]
    async fn test_transcribe_error_status() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/inference");
            then.status(503);
        });

        let transcriber =
            HttpTranscriber::new(server.url("/inference"), "base.en", Duration::from_secs(5))
                .unwrap();
        let err = transcriber
            .transcribe(&[0; 160], 16_000, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognizerError::Status { status: 503 }));
    }
}
