//! Anthropic Messages API client implementing [`CompletionModel`].
//!
//! Auth is via the `x-api-key` header with a required `anthropic-version`
//! header. The request timeout comes from [`ModelConfig`]; failed calls are
//! never retried here because the core's fallback policy owns failure
//! handling.

use crate::{CompletionModel, ModelError, ModelResult};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use serde_json::Value;
use sf_observability::metrics::MODEL_LATENCY;
use std::time::{Duration, Instant};
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the messages-API client.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model identifier to request.
    pub model: String,
    /// API base URL override.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds, applied by the HTTP client.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// HTTP client for the Anthropic Messages API.
pub struct MessagesClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl MessagesClient {
    /// Creates a client, reading the API key from the environment variable
    /// named in `config.api_key_env`.
    ///
    /// Returns [`ModelError::AuthFailed`] if the variable is not set.
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ModelError::AuthFailed(format!("env var '{}' not set", config.api_key_env))
        })?;
        Self::new_with_key(config, api_key)
    }

    /// Creates a client with an explicitly provided API key, for when the
    /// key was resolved externally (e.g. from a credential store).
    pub fn new_with_key(config: &ModelConfig, api_key: String) -> ModelResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Builds the JSON request body for a single-turn user prompt.
    fn build_request_body(&self, prompt: &str, max_output_tokens: u32) -> Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": max_output_tokens,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        })
    }

    /// Concatenates the text blocks of a Messages API response.
    fn extract_text(body: &Value) -> ModelResult<String> {
        let blocks = body["content"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse("missing 'content' array in response".to_string())
        })?;

        let text: String = blocks
            .iter()
            .filter(|b| b["type"].as_str() == Some("text"))
            .filter_map(|b| b["text"].as_str())
            .collect();

        Ok(text)
    }

    /// Maps an HTTP error status to the appropriate [`ModelError`].
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> ModelError {
        match status.as_u16() {
            401 | 403 => ModelError::AuthFailed(format!("HTTP {}", status)),
            429 => {
                let retry_after = serde_json::from_str::<Value>(body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                ModelError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            402 => ModelError::QuotaExceeded(body_text.to_string()),
            _ => ModelError::Connection(format!("HTTP {}: {}", status, body_text)),
        }
    }
}

#[async_trait]
impl CompletionModel for MessagesClient {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> ModelResult<String> {
        let body = self.build_request_body(prompt, max_output_tokens);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = self.model.as_str(),
            prompt_chars = prompt.len(),
            "Sending completion request"
        );

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(e.to_string())
                } else {
                    ModelError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("failed to read body: {}", e)))?;

        histogram!(MODEL_LATENCY, "model" => self.model.clone())
            .record(started.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let response_json: Value = serde_json::from_str(&body_text)
            .map_err(|e| ModelError::InvalidResponse(format!("invalid JSON: {}", e)))?;

        Self::extract_text(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
