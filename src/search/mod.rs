//! Search API abstraction.
//!
//! The fetch stage talks to the search backend only through
//! [`SearchClient`], so tests can swap in fakes.

pub mod exa;

pub use exa::ExaClient;

use async_trait::async_trait;
use thiserror::Error;

/// One query against the search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub num_results: usize,
    /// ISO 8601 lower bound on the publication date.
    pub start_published_date: String,
    /// ISO 8601 upper bound on the publication date.
    pub end_published_date: String,
}

/// A raw hit as returned by the search backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHit {
    pub title: Option<String>,
    pub url: String,
    pub published_date: Option<String>,
    pub author: Option<String>,
    pub text: Option<String>,
    pub highlights: Vec<String>,
    pub score: Option<f64>,
}

/// Errors that can occur during a search request.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Rate limited by the search provider
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The API key was rejected
    #[error("Search API rejected the API key")]
    Unauthorized,

    /// Non-success status from the search provider
    #[error("Search API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Request timed out
    #[error("Search timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection or transport failure
    #[error("Search request failed: {0}")]
    Network(String),

    /// Body could not be decoded
    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

impl SearchError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::RateLimited { .. } | SearchError::Timeout { .. }
        )
    }
}

/// Trait for search backends.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a single query and return its hits.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
