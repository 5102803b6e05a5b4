//! # sf-model
//!
//! The language-model completion capability consumed by the Sentinel Fuse core.
//!
//! The core needs exactly one operation from a model: given a text prompt and
//! an output budget, return completion text. [`CompletionModel`] defines that
//! boundary, [`client::MessagesClient`] implements it against the Anthropic
//! Messages API, and [`mock::MockModel`] provides a scriptable test double.
//!
//! Failures are typed ([`ModelError`]) but callers in the core never surface
//! them; every consumer degrades to a deterministic fallback instead.

pub mod client;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when calling the model capability.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("Model call timed out: {0}")]
    Timeout(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// A text-completion capability.
///
/// Implementations are long-lived, shared, read-mostly clients initialized
/// once per process. They hold no per-call mutable state and apply their own
/// request timeout; callers never retry a failed call.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Sends `prompt` to the model and returns the completion text.
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> ModelResult<String>;

    /// Returns the underlying model name, for logging.
    fn model_name(&self) -> &str;
}
