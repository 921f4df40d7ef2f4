//! OpenAI-compatible chat completions client

use super::{http_client, ModelResponse, ReasoningBackend};
use crate::config::ReasoningConfig;
use crate::errors::{AppError, Result};
use crate::retry::{classify, with_retries};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIChatBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<ModelResponse>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChatBackend {
    pub fn new(config: &ReasoningConfig, model: &str, temperature: f32) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: config.api_key.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.to_string(),
            temperature,
            max_retries: config.max_retries,
        })
    }

    async fn request(&self, prompt: &str) -> std::result::Result<ModelResponse, backoff::Error<AppError>> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            backoff::Error::transient(AppError::ReasoningBackend {
                message: format!("LLM API request failed: {}", e),
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(
                status,
                AppError::ReasoningBackend {
                    message: format!("LLM API error {}: {}", status, body),
                },
            ));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::ReasoningBackend {
                message: format!("Failed to parse LLM response: {}", e),
            })
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                backoff::Error::permanent(AppError::ReasoningBackend {
                    message: "Empty response from LLM".to_string(),
                })
            })
    }
}

#[async_trait]
impl ReasoningBackend for OpenAIChatBackend {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<ModelResponse> {
        with_retries("openai", self.max_retries, || self.request(prompt)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
