//! OpenAI-compatible API backend for the storyteller.
//!
//! Works against any server implementing the chat completions API
//! (OpenAI itself, Ollama, vLLM, llama.cpp server). Replies are fetched
//! whole; the turn controller does its own sentence splitting so it can
//! stop between sentences.

use crate::collaborators::{ChatMessage, LanguageModel};
use crate::config::LlmConfig;
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chat-completions client.
pub struct ApiLanguageModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for ApiLanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiLanguageModel")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ApiLanguageModel {
    /// Create a client for the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| SessionError::Llm(format!("failed to build HTTP client: {e}")))?;

        let model = Self {
            client,
            base_url: normalize_base_url(&config.api_url),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        info!(
            "API LLM configured: {} model={}",
            model.base_url, model.model
        );
        Ok(model)
    }

    /// Point the client at a different server.
    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(url.as_ref());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for ApiLanguageModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let started = Instant::now();
        let mut request = self.client.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Llm(format!("invalid response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SessionError::Llm("response has no choices".to_owned()))?;

        debug!(
            "completion of {} chars in {:.2}s",
            content.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(content.trim().to_owned())
    }
}

/// Strip trailing slashes and a trailing `/v1` so the endpoint can be
/// appended uniformly.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    url.strip_suffix("/v1").unwrap_or(url).to_owned()
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> SessionError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 => SessionError::Llm(format!("authentication failed: {message}")),
        429 => SessionError::Llm(format!("rate limited: {message}")),
        code => SessionError::Llm(format!("HTTP {code}: {message}")),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_owned())
}
