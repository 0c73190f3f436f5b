//! Support chat proxy.
//!
//! Builds a single text prompt from the support preamble, the trailing
//! history window and the new message, then asks the upstream
//! `generateContent` endpoint for a reply. When the configured model is
//! unknown upstream the fallback model is tried once.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use pizza_time_core::{ChatRole, ChatTurn, chat::trailing_window};

use crate::config::ChatConfig;

const PREAMBLE: &str = "You are a helpful customer support assistant for Pizza Time, a pizza delivery app. Be friendly, concise, and helpful. Answer questions about orders, menu items, delivery, and account issues.\n\n";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the chat upstream.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key configured.
    #[error("chat service is not configured")]
    NotConfigured,

    /// Upstream rejected the key.
    #[error("invalid API key: {0}")]
    InvalidKey(String),

    /// Neither model is available.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Upstream quota exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other upstream error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with an unexpected body.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ChatError {
    /// Text shown to the person chatting.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => "Chat service is not configured. Please add GEMINI_API_KEY to the server environment.".to_owned(),
            Self::InvalidKey(_) => "Invalid Gemini API key. Please check your GEMINI_API_KEY setting.".to_owned(),
            Self::ModelNotFound(_) => "Gemini model not found. The model name may be incorrect.".to_owned(),
            Self::QuotaExceeded(_) => "API quota exceeded. Please check your Google AI Studio quota.".to_owned(),
            other => format!("Chat error: {other}"),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: UpstreamError,
}

#[derive(Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Support chat client.
#[derive(Clone)]
pub struct ChatService {
    inner: Arc<ChatServiceInner>,
}

struct ChatServiceInner {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatService {
    /// Create a chat client.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Http` if the HTTP client cannot be built.
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            inner: Arc::new(ChatServiceInner { client, config }),
        })
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.config.api_key.is_some()
    }

    /// Ask for a reply to `message` given the prior conversation.
    ///
    /// # Errors
    ///
    /// Returns a classified `ChatError` when no reply can be produced.
    #[instrument(skip(self, message, history), fields(history_len = history.len()))]
    pub async fn reply(&self, message: &str, history: &[ChatTurn]) -> Result<String, ChatError> {
        let prompt = build_prompt(message, history);
        let config = &self.inner.config;

        match self.generate(&config.model, &prompt).await {
            Err(ChatError::ModelNotFound(reason)) if config.fallback_model != config.model => {
                tracing::warn!(
                    model = %config.model,
                    fallback = %config.fallback_model,
                    %reason,
                    "model unavailable, falling back"
                );
                self.generate(&config.fallback_model, &prompt).await
            }
            result => result,
        }
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ChatError> {
        let config = &self.inner.config;
        let api_key = config.api_key.as_ref().ok_or(ChatError::NotConfigured)?;
        let url = format!(
            "{}/models/{model}:generateContent",
            config.api_base.trim_end_matches('/')
        );

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .inner
            .client
            .post(&url)
            .query(&[("key", api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;
        let reply: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if reply.trim().is_empty() {
            return Err(ChatError::Parse("upstream returned no text".to_owned()));
        }
        tracing::debug!(model, "chat reply received");
        Ok(reply)
    }
}

/// Render the single prompt sent upstream.
#[must_use]
pub fn build_prompt(message: &str, history: &[ChatTurn]) -> String {
    let mut prompt = String::from(PREAMBLE);
    for turn in trailing_window(history) {
        let speaker = match turn.role {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(message);
    prompt.push_str("\n\nAssistant:");
    prompt
}

fn classify(status: u16, body: &str) -> ChatError {
    let (message, upstream_status) = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| (body.to_owned(), String::new()),
        |envelope| (envelope.error.message, envelope.error.status),
    );
    let haystack = format!("{upstream_status} {message} {body}");

    if haystack.contains("API_KEY_INVALID") || haystack.contains("API key") || status == 401 || status == 403 {
        ChatError::InvalidKey(message)
    } else if status == 404 || haystack.contains("NOT_FOUND") {
        ChatError::ModelNotFound(message)
    } else if status == 429 || haystack.to_lowercase().contains("quota") {
        ChatError::QuotaExceeded(message)
    } else {
        ChatError::Api { status, message }
    }
}
