//! Scriptable mock model for testing.
//!
//! Supports queued responses, failure injection, and prompt recording so
//! tests can assert on what the engines actually sent.

use crate::{CompletionModel, ModelError, ModelResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Behavior configuration for failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Normal operation.
    #[default]
    Normal,
    /// Fail after N calls.
    FailAfter { calls: u64, error: ModelError },
    /// Always fail.
    AlwaysFail(ModelError),
}

/// Mock completion model for testing.
pub struct MockModel {
    queued: Mutex<VecDeque<String>>,
    default_response: Mutex<Option<String>>,
    behavior: Mutex<MockBehavior>,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicU64,
}

impl MockModel {
    /// Creates a mock with no scripted responses; calls fail with
    /// [`ModelError::InvalidResponse`] until a response is configured.
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default_response: Mutex::new(None),
            behavior: Mutex::new(MockBehavior::Normal),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock that returns `text` for every call.
    pub fn with_response(text: impl Into<String>) -> Self {
        Self {
            default_response: Mutex::new(Some(text.into())),
            ..Self::new()
        }
    }

    /// Creates a mock that fails every call with `error`.
    pub fn failing(error: ModelError) -> Self {
        Self {
            behavior: Mutex::new(MockBehavior::AlwaysFail(error)),
            ..Self::new()
        }
    }

    /// Queues a one-shot response; queued responses are consumed before the
    /// default response.
    pub async fn push_response(&self, text: impl Into<String>) {
        self.queued.lock().await.push_back(text.into());
    }

    /// Sets the response returned when the queue is empty.
    pub async fn set_default_response(&self, text: impl Into<String>) {
        *self.default_response.lock().await = Some(text.into());
    }

    /// Sets the behavior for failure injection.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Returns every prompt sent to this mock, in call order.
    pub async fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Returns the number of completed calls.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    async fn complete(&self, prompt: &str, _max_output_tokens: u32) -> ModelResult<String> {
        self.prompts.lock().await.push(prompt.to_string());
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        let behavior = self.behavior.lock().await;
        match &*behavior {
            MockBehavior::Normal => {}
            MockBehavior::AlwaysFail(error) => return Err(error.clone()),
            MockBehavior::FailAfter { calls, error } => {
                if count > *calls {
                    return Err(error.clone());
                }
            }
        }
        drop(behavior);

        if let Some(text) = self.queued.lock().await.pop_front() {
            return Ok(text);
        }

        self.default_response
            .lock()
            .await
            .clone()
            .ok_or_else(|| ModelError::InvalidResponse("no scripted response".to_string()))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
