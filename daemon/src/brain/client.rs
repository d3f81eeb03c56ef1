//! Ollama chat client
//!
//! Sends one non-streaming `/api/chat` request per question. The persona
//! prefix and a short rolling history live here, so callers only pass the
//! words the user said. History is kept in memory only.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BrainConfig;

/// Errors from a brain round-trip. None of these are fatal to the robot.
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    #[error("brain request timed out")]
    Timeout,

    #[error("brain unreachable: {0}")]
    Network(#[source] reqwest::Error),

    #[error("brain returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed brain response: {0}")]
    Malformed(String),

    #[error("brain returned an empty reply")]
    Empty,
}

impl From<reqwest::Error> for BrainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrainError::Timeout
        } else {
            BrainError::Network(err)
        }
    }
}

/// Request/response language model
#[async_trait]
pub trait Brain: Send + Sync {
    /// Ask a question and return the reply text
    async fn ask(&self, prompt: &str) -> Result<String, BrainError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Ollama native reply, or an OpenAI-style `choices` array
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        self.message
            .or_else(|| self.choices.into_iter().next().and_then(|c| c.message))
            .map(|m| m.content)
    }
}

/// Brain backed by an Ollama server
pub struct OllamaBrain {
    client: reqwest::Client,
    url: String,
    model: String,
    persona: String,
    history_turns: usize,
    history: Mutex<VecDeque<(String, String)>>,
}

impl OllamaBrain {
    /// Create a client for `base_url` (e.g. `http://192.168.1.8:11434`)
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BrainError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into();

        Ok(Self {
            client,
            url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.into(),
            persona: String::new(),
            history_turns: 0,
            history: Mutex::new(VecDeque::new()),
        })
    }

    /// Create a client from the `[brain]` config section
    pub fn from_config(config: &BrainConfig) -> Result<Self, BrainError> {
        Ok(Self::new(config.base_url(), &config.model, config.timeout())?
            .with_persona(&config.persona)
            .with_history(config.history_turns))
    }

    /// Text prepended to every question
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Keep up to `turns` past exchanges as context
    pub fn with_history(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    fn messages_for(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Ok(history) = self.history.lock() {
            for (question, answer) in history.iter() {
                messages.push(ChatMessage::user(question.clone()));
                messages.push(ChatMessage::assistant(answer.clone()));
            }
        }
        messages.push(ChatMessage::user(format!("{}{}", self.persona, prompt)));
        messages
    }

    fn remember(&self, prompt: &str, reply: &str) {
        if self.history_turns == 0 {
            return;
        }
        if let Ok(mut history) = self.history.lock() {
            history.push_back((prompt.to_string(), reply.to_string()));
            while history.len() > self.history_turns {
                history.pop_front();
            }
        }
    }
}

#[async_trait]
impl Brain for OllamaBrain {
    async fn ask(&self, prompt: &str) -> Result<String, BrainError> {
        let request = ChatRequest {
            model: &self.model,
            messages: self.messages_for(prompt),
            stream: false,
        };

        debug!(url = %self.url, model = %self.model, "asking brain");
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrainError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&body)
            .map_err(|e| BrainError::Malformed(e.to_string()))?;

        let reply = parsed
            .into_content()
            .ok_or_else(|| BrainError::Malformed("no message in response".to_string()))?
            .trim()
            .to_string();

        if reply.is_empty() {
            return Err(BrainError::Empty);
        }

        self.remember(prompt, &reply);
        Ok(reply)
    }
}
