//! Summarizer abstraction with Anthropic and Ollama implementations.
//!
//! - [`AnthropicSummarizer`]: Anthropic Messages API
//! - [`OllamaSummarizer`]: local Ollama chat endpoint
//! - [`MockSummarizer`]: test double for unit tests
//!
//! The engine issues at most one call per request and never retries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while summarizing.
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// The ANTHROPIC_API_KEY environment variable is not set.
    #[error("ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,

    /// `ARCHIVE_QUERY_SUMMARIZER` names no known backend.
    #[error("Unknown summarizer backend '{0}' (expected 'anthropic' or 'ollama')")]
    UnknownBackend(String),

    /// HTTP or network error occurred.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse the API response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Model returned no text content.
    #[error("Model returned empty response")]
    EmptyResponse,

    /// No summarizer could be configured at startup.
    #[error("Summarizer not configured: {0}")]
    Disabled(String),
}

// ============================================================================
// Prompt
// ============================================================================

const SYSTEM_PROMPT: &str = "You are an assistant that summarizes conversations.";

/// System prompt naming who the conversation was with and when.
pub fn system_prompt(contact_name: &str, period_label: &str) -> String {
    format!(
        "{SYSTEM_PROMPT} Summarize the following conversation with {contact_name} \
         that took place in {period_label}."
    )
}

// ============================================================================
// Summarizer Trait
// ============================================================================

/// Turns a conversation transcript into a summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `conversation` under the instructions in `system`.
    async fn summarize(&self, system: &str, conversation: &str) -> Result<String, SummarizerError>;
}

/// Build the summarizer selected by `ARCHIVE_QUERY_SUMMARIZER`
/// (`anthropic` by default, or `ollama`).
pub fn from_env() -> Result<Arc<dyn Summarizer>, SummarizerError> {
    let backend = std::env::var("ARCHIVE_QUERY_SUMMARIZER").unwrap_or_else(|_| "anthropic".into());
    match backend.trim().to_lowercase().as_str() {
        "anthropic" => Ok(Arc::new(AnthropicSummarizer::from_env()?)),
        "ollama" => Ok(Arc::new(OllamaSummarizer::from_env())),
        other => Err(SummarizerError::UnknownBackend(other.to_string())),
    }
}

/// Like [`from_env`], but a configuration error yields a
/// [`DisabledSummarizer`] so non-summary queries still work.
pub fn from_env_or_disabled() -> Arc<dyn Summarizer> {
    from_env().unwrap_or_else(|e| {
        warn!("summaries disabled: {e}");
        Arc::new(DisabledSummarizer {
            reason: e.to_string(),
        })
    })
}

/// Summarizer that always fails with the configuration error it was built
/// from.
pub struct DisabledSummarizer {
    reason: String,
}

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(
        &self,
        _system: &str,
        _conversation: &str,
    ) -> Result<String, SummarizerError> {
        Err(SummarizerError::Disabled(self.reason.clone()))
    }
}

/// A chat message in either API's request body.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

// ============================================================================
// Anthropic API Implementation
// ============================================================================

/// Client for the Anthropic Claude API.
pub struct AnthropicSummarizer {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

/// Request body for the Anthropic Messages API.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ChatMessage>,
}

/// Response from the Anthropic Messages API.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

/// A content block in the API response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

impl AnthropicSummarizer {
    /// Create a client by reading `ANTHROPIC_API_KEY` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SummarizerError::MissingApiKey`] if the variable is not set.
    pub fn from_env() -> Result<Self, SummarizerError> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| SummarizerError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Create a client with an explicit API key.
    ///
    /// Uses model `claude-haiku-4-5` and max tokens `2048`.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 2048,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(&self, system: &str, conversation: &str) -> Result<String, SummarizerError> {
        let request_body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: conversation.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SummarizerError::Http(e.to_string()))?;

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::Parse(e.to_string()))?;

        api_response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(SummarizerError::EmptyResponse)
    }
}

// ============================================================================
// Ollama Implementation
// ============================================================================

/// Client for a local Ollama server's chat endpoint.
pub struct OllamaSummarizer {
    host: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaSummarizer {
    /// Reads `OLLAMA_HOST` (default `http://localhost:11434`) and
    /// `OLLAMA_MODEL` (default `llama3`).
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".into());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3".into());
        Self::new(host, model)
    }

    pub fn new(host: String, model: String) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, system: &str, conversation: &str) -> Result<String, SummarizerError> {
        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: conversation.to_string(),
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&request_body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SummarizerError::Http(e.to_string()))?;

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::Parse(e.to_string()))?;

        let text = api_response.message.content;
        if text.trim().is_empty() {
            return Err(SummarizerError::EmptyResponse);
        }
        Ok(text)
    }
}

// ============================================================================
// Mock Implementation (Test Only)
// ============================================================================

/// Mock summarizer for testing. Returns pre-programmed results in FIFO order
/// and records every `(system, conversation)` pair it receives.
#[cfg(test)]
pub struct MockSummarizer {
    pub responses: std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>,
    pub calls: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockSummarizer {
    /// Each call pops the next result; `Err` values surface as
    /// [`SummarizerError::Http`].
    ///
    /// # Panics
    ///
    /// Panics if called more times than there are results.
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, system: &str, conversation: &str) -> Result<String, SummarizerError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), conversation.to_string()));

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockSummarizer: no more responses available")
            .map_err(SummarizerError::Http)
    }
}

// ============================================================================
// Tests
// ============================================================================
