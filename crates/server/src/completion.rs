//! Chat completion client.
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol (Groq by
//! default) and returns the first choice's text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use webchat_core::{AppConfig, ChatMessage, Error};

/// Longest upstream error body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Capability to turn a message list into a reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, Error>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// reqwest-backed client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleClient {
    http: Client,
    endpoint: String,
    model: String,
    /// Pre-computed `"Bearer <key>"`; `None` when no key is configured.
    auth_header: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<&str>) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::CompletionFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            auth_header: api_key.map(|k| format!("Bearer {k}")),
        })
    }

    /// Build from config. A missing key is logged here and reported on first use.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let api_key = match config.require_completion_api_key() {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("{e}; chat requests will fail until it is set");
                None
            }
        };
        Self::new(&config.completion_base_url, config.completion_model.clone(), api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, Error> {
        let auth_header = self
            .auth_header
            .as_ref()
            .ok_or_else(|| Error::CompletionFailed("completion_api_key is not set".into()))?;

        tracing::info!(model = %self.model, messages = messages.len(), "starting completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .json(&ChatRequest { model: &self.model, messages })
            .send()
            .await
            .map_err(|e| Error::CompletionFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(Error::CompletionFailed(format!("status {}: {body}", status.as_u16())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::CompletionFailed(format!("response decode failed: {e}")))?;

        tracing::info!("completion request finished");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::CompletionFailed("response had no content".into()))
    }
}
