//! LLM modules for digest analysis.
//!
//! This module provides the completion client seam and the analyzer that
//! turns a dataset into summary sections.

pub mod analyzer;
pub mod openrouter;

pub use analyzer::Analyzer;
pub use openrouter::OpenRouterClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message in the chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single chat completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Errors from the completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Cannot reach completion API: {0}")]
    Unreachable(String),

    #[error("Completion API rate limit exceeded")]
    RateLimited,

    #[error("Completion API quota exceeded")]
    QuotaExceeded,

    #[error("Completion API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("The model returned an empty response")]
    EmptyResponse,
}

/// Trait for chat completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the request and return the generated text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
