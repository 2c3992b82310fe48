//! Exa search API client.
//!
//! Implements [`SearchClient`] against Exa's `/search` endpoint, asking for
//! page text and highlights in the same round-trip.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{RawHit, SearchClient, SearchError, SearchRequest};
use crate::config::SearchConfig;

/// Exa search API client.
pub struct ExaClient {
    api_key: String,
    base_url: String,
    timeout_secs: u64,
    client: Client,
}

impl ExaClient {
    /// Create a new Exa client.
    pub fn new(api_key: String, config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SearchError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_seconds,
            client,
        })
    }
}

#[async_trait]
impl SearchClient for ExaClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let body = ExaSearchRequest {
            query: &request.query,
            num_results: request.num_results,
            start_published_date: &request.start_published_date,
            end_published_date: &request.end_published_date,
            contents: ExaContents {
                text: true,
                highlights: true,
            },
        };

        debug!("Exa search: {}", request.query);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(60);
            return Err(SearchError::RateLimited { retry_after_secs });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SearchError::Unauthorized);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let data: ExaSearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        debug!("Exa returned {} results", data.results.len());

        Ok(data.results.into_iter().map(RawHit::from).collect())
    }

    fn name(&self) -> &'static str {
        "exa"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    start_published_date: &'a str,
    end_published_date: &'a str,
    contents: ExaContents,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: bool,
    highlights: bool,
}

#[derive(Debug, Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    highlights: Option<Vec<String>>,
    #[serde(default)]
    score: Option<f64>,
}

impl From<ExaResult> for RawHit {
    fn from(r: ExaResult) -> Self {
        RawHit {
            title: r.title,
            url: r.url,
            published_date: r.published_date,
            author: r.author,
            text: r.text,
            highlights: r.highlights.unwrap_or_default(),
            score: r.score,
        }
    }
}
