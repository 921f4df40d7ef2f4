//! Reasoning backend with pre-programmed replies
//!
//! Used when no provider is configured and throughout the test suites.
//! Every prompt it receives is recorded for inspection.

use super::{ModelResponse, ReasoningBackend};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) const OFFLINE_REPLY: &str =
    "No reasoning backend is configured for this deployment, so this is a placeholder reply.";

enum Reply {
    Respond(ModelResponse),
    Fail(String),
}

pub struct ScriptedBackend {
    fallback: String,
    queue: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// A backend answering `fallback` whenever its queue is empty
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            queue: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for the next call
    pub fn push(&self, response: ModelResponse) -> &Self {
        self.lock_queue().push_back(Reply::Respond(response));
        self
    }

    /// Queue a plain text response for the next call
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(ModelResponse::Text(text.into()))
    }

    /// Make the next call fail
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock_queue().push_back(Reply::Fail(message.into()));
        self
    }

    /// Every prompt received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent prompt, if any
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts().pop()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<ModelResponse> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        match self.lock_queue().pop_front() {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(AppError::ReasoningBackend { message }),
            None => Ok(ModelResponse::Text(self.fallback.clone())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
