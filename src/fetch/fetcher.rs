//! Per-category fetching.
//!
//! Runs one search per (topic, category) pair, normalizes the hits into
//! [`Item`]s and deduplicates them by URL. A failed topic contributes zero
//! items and a recorded failure; it never aborts the category.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::models::{truncate_chars, Bucket, Category, FetchFailure, Item, Window};
use crate::search::{RawHit, SearchClient, SearchError, SearchRequest};

/// Maximum highlights kept per item.
const MAX_HIGHLIGHTS: usize = 3;

/// Fetches buckets through a search client.
pub struct Fetcher<S> {
    client: S,
    config: SearchConfig,
}

impl<S: SearchClient> Fetcher<S> {
    pub fn new(client: S, config: SearchConfig) -> Self {
        Self { client, config }
    }

    /// The (topic, query) pairs that a fetch of `category` would send.
    pub fn planned_queries(&self, topics: &[String], category: Category) -> Vec<(String, String)> {
        plan_queries(&self.config, topics, category)
    }

    /// Fetch one category for the given topics within `window`.
    pub async fn fetch(&self, topics: &[String], category: Category, window: &Window) -> Bucket {
        let mut items = Vec::new();
        let mut failures = Vec::new();

        for (topic, query) in self.planned_queries(topics, category) {
            let request = SearchRequest {
                query,
                num_results: self.config.num_results,
                start_published_date: window.start_timestamp(),
                end_published_date: window.end_timestamp(),
            };

            match self.search_with_retry(&request).await {
                Ok(hits) => {
                    debug!(
                        "{} returned {} hits for {} '{}'",
                        self.client.name(),
                        hits.len(),
                        category,
                        topic
                    );
                    items.extend(
                        hits.into_iter()
                            .filter(|hit| !hit.url.trim().is_empty())
                            .map(|hit| normalize_hit(hit, category, &topic)),
                    );
                }
                Err(e) => {
                    warn!("Error fetching {} for '{}': {}", category.label(), topic, e);
                    failures.push(FetchFailure {
                        category,
                        topic,
                        message: e.to_string(),
                    });
                }
            }
        }

        let bucket = Bucket::new(category, items, failures);
        info!(
            "Fetched {} {} ({} failed queries)",
            bucket.len(),
            category.label(),
            bucket.failures.len()
        );
        bucket
    }

    /// Retries rate-limit and timeout errors up to the configured budget.
    async fn search_with_retry(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError> {
        let mut attempt = 0;

        loop {
            match self.client.search(request).await {
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        "{} (retry {}/{} in {}ms)",
                        e, attempt, self.config.retries, self.config.retry_delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
                result => return result,
            }
        }
    }
}

/// The (topic, query) pairs sent for `category`, capped by its topic limit.
pub fn plan_queries(
    config: &SearchConfig,
    topics: &[String],
    category: Category,
) -> Vec<(String, String)> {
    topics
        .iter()
        .take(config.topic_limit(category))
        .map(|topic| (topic.clone(), category.query_for(topic)))
        .collect()
}

/// Convert a raw search hit into an [`Item`].
pub fn normalize_hit(hit: RawHit, category: Category, topic: &str) -> Item {
    let url = hit.url.trim().to_string();
    let text = hit.text.as_deref().unwrap_or("").trim();

    let title = hit
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title(category, &url));

    let stars = match category {
        Category::Code => parse_star_count(text),
        _ => None,
    };

    Item {
        title,
        url,
        category,
        topic: topic.to_string(),
        published_date: hit.published_date,
        snippet: truncate_chars(text, category.snippet_chars()),
        highlights: hit.highlights.into_iter().take(MAX_HIGHLIGHTS).collect(),
        author: hit
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
        stars,
        score: hit.score,
    }
}

fn fallback_title(category: Category, url: &str) -> String {
    match category {
        Category::Social => "No title".to_string(),
        Category::Code => repo_name_from_url(url).unwrap_or_else(|| url.to_string()),
        Category::Paper => "Untitled Paper".to_string(),
    }
}

/// Extract `owner/repo` from a GitHub URL.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .strip_prefix("github.com/")?;

    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let owner = parts.next()?;
    let repo = parts.next()?.trim_end_matches(".git");

    Some(format!("{}/{}", owner, repo))
}

/// Best-effort star count from text like "1.2k stars" or "Stars: 340".
pub fn parse_star_count(text: &str) -> Option<u64> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    for pair in tokens.windows(2) {
        if is_star_word(pair[1]) {
            if let Some(n) = parse_count(pair[0]) {
                return Some(n);
            }
        }
        if is_star_word(pair[0]) {
            if let Some(n) = parse_count(pair[1]) {
                return Some(n);
            }
        }
    }

    None
}

fn is_star_word(token: &str) -> bool {
    let word = token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    word == "stars" || word == "star"
}

fn parse_count(token: &str) -> Option<u64> {
    let cleaned = token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '.')
        .trim_end_matches('.')
        .replace(',', "")
        .to_lowercase();

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = cleaned.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        (cleaned.as_str(), 1.0)
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some((value * multiplier).round() as u64)
}
