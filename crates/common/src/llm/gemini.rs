//! Google Gemini `generateContent` client

use super::{http_client, ContentBlock, ModelResponse, ReasoningBackend};
use crate::config::ReasoningConfig;
use crate::errors::{AppError, Result};
use crate::retry::{classify, with_retries};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

impl GeminiBackend {
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
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let request = GenerateRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await.map_err(|e| {
            backoff::Error::transient(AppError::ReasoningBackend {
                message: format!("Gemini request failed: {}", e),
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(
                status,
                AppError::ReasoningBackend {
                    message: format!("Gemini API error {}: {}", status, body),
                },
            ));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::ReasoningBackend {
                message: format!("Failed to parse Gemini response: {}", e),
            })
        })?;

        into_model_response(parsed).map_err(backoff::Error::permanent)
    }
}

fn into_model_response(response: GenerateResponse) -> Result<ModelResponse> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::ReasoningBackend {
            message: "Gemini returned no candidates".to_string(),
        })?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        return Err(AppError::ReasoningBackend {
            message: format!(
                "Gemini returned an empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }

    // Thought summaries are not part of the answer
    let blocks: Vec<ContentBlock> = parts
        .into_iter()
        .filter(|part| part.get("thought").and_then(Value::as_bool) != Some(true))
        .map(|part| serde_json::from_value(part.clone()).unwrap_or(ContentBlock::Other(part)))
        .collect();

    Ok(match blocks.as_slice() {
        [ContentBlock::Text { text }] => ModelResponse::Text(text.clone()),
        _ => ModelResponse::Blocks(blocks),
    })
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<ModelResponse> {
        let response = with_retries("gemini", self.max_retries, || self.request(prompt)).await?;
        debug!("Gemini response received");
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
