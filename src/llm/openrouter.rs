//! OpenAI-compatible chat completion client.
//!
//! Talks to OpenRouter by default; any endpoint serving
//! `/chat/completions` with bearer auth works.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};
use crate::config::ModelConfig;

/// Chat completions API request.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat completions API response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Completion client for OpenRouter.
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl OpenRouterClient {
    /// Create a new client with the model config's timeout.
    pub fn new(api_key: String, config: &ModelConfig) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CompletionError::Unreachable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            http_client,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            "Sending completion request to {} ({} messages)",
            request.model,
            request.messages.len()
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout {
                        timeout_secs: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    CompletionError::Unreachable(format!("cannot connect to {}", self.base_url))
                } else {
                    CompletionError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }

        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(CompletionError::QuotaExceeded);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout {
                    timeout_secs: self.timeout_seconds,
                }
            } else {
                CompletionError::MalformedResponse(e.to_string())
            }
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::MalformedResponse("no choices returned".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }

        Ok(content)
    }
}
