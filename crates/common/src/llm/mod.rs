//! Reasoning backend clients
//!
//! A backend turns a prompt into a [`ModelResponse`]. Providers answer
//! either with plain text or with a list of content blocks, so the
//! response is a tagged union normalised by [`ModelResponse::into_text`].

mod gemini;
mod openai;
mod scripted;

pub use gemini::GeminiBackend;
pub use openai::OpenAIChatBackend;
pub use scripted::ScriptedBackend;

use crate::config::ReasoningConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One block of a multi-part model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Text { text: String },
    Other(Value),
}

/// Raw backend output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelResponse {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl ModelResponse {
    /// Flatten into a single string: blocks are concatenated in order and
    /// non-text blocks contribute their JSON rendering.
    pub fn into_text(self) -> String {
        match self {
            ModelResponse::Text(text) => text,
            ModelResponse::Blocks(blocks) => blocks
                .into_iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => text,
                    ContentBlock::Other(value) => value.to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ModelResponse>;

    fn model_name(&self) -> &str;
}

/// The two backends the orchestrator is wired with
#[derive(Clone)]
pub struct Backends {
    /// Conversational turns (lower temperature)
    pub chat: Arc<dyn ReasoningBackend>,
    /// Gap analysis and deep research
    pub research: Arc<dyn ReasoningBackend>,
}

/// Create the chat and research backends based on configuration
pub fn create_backends(config: &ReasoningConfig) -> Result<Backends> {
    match config.provider.as_str() {
        "gemini" => Ok(Backends {
            chat: Arc::new(GeminiBackend::new(
                config,
                &config.chat_model,
                config.chat_temperature,
            )?),
            research: Arc::new(GeminiBackend::new(
                config,
                &config.research_model,
                config.research_temperature,
            )?),
        }),
        "openai" => Ok(Backends {
            chat: Arc::new(OpenAIChatBackend::new(
                config,
                &config.chat_model,
                config.chat_temperature,
            )?),
            research: Arc::new(OpenAIChatBackend::new(
                config,
                &config.research_model,
                config.research_temperature,
            )?),
        }),
        "scripted" => {
            tracing::warn!("No reasoning provider configured, answers are scripted");
            Ok(Backends {
                chat: Arc::new(ScriptedBackend::new(scripted::OFFLINE_REPLY)),
                research: Arc::new(ScriptedBackend::new(scripted::OFFLINE_REPLY)),
            })
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown reasoning provider: {}", other),
        }),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}
