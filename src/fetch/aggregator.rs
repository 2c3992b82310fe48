//! Dataset aggregation.
//!
//! Runs the fetcher for each category concurrently and merges the
//! resulting buckets by category key.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::info;

use super::fetcher::Fetcher;
use crate::models::{Category, Dataset, Window};
use crate::search::SearchClient;

/// Fetch every requested category and freeze the result into a [`Dataset`].
///
/// Categories are fetched independently; a category whose queries all fail
/// simply contributes an empty, partial bucket. Categories not requested
/// appear as empty buckets.
pub async fn aggregate<S: SearchClient>(
    fetcher: &Fetcher<S>,
    topics: &[String],
    categories: &[Category],
    window: Window,
    fetched_at: DateTime<Utc>,
) -> Dataset {
    let mut unique: Vec<Category> = Vec::new();
    for category in categories {
        if !unique.contains(category) {
            unique.push(*category);
        }
    }

    info!(
        "Fetching {} categories for {} topics ({})",
        unique.len(),
        topics.len(),
        window
    );

    let buckets = join_all(
        unique
            .iter()
            .map(|category| fetcher.fetch(topics, *category, &window)),
    )
    .await;

    let dataset = Dataset::new(topics.to_vec(), window, fetched_at, buckets);

    info!(
        "Aggregated {} items ({})",
        dataset.total_items(),
        summary_line(&dataset)
    );

    dataset
}

/// One-line count summary, e.g. `X/Twitter: 3 | GitHub: 1 | arXiv: 0`.
pub fn summary_line(dataset: &Dataset) -> String {
    dataset
        .counts()
        .into_iter()
        .map(|(category, count)| {
            let marker = if dataset.bucket(category).is_partial() {
                " (partial)"
            } else {
                ""
            };
            format!("{}: {}{}", category, count, marker)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::fetch::fetcher::tests::{hit, FakeSearch};
    use crate::models::tests::fixed_now;

    fn config() -> SearchConfig {
        SearchConfig {
            retry_delay_ms: 0,
            ..SearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_aggregate_all_categories() {
        let search = FakeSearch::default()
            .with(
                "robotics AI",
                vec![
                    hit("Post", "https://x.com/p/1"),
                    hit("Repost", "https://x.com/p/1"),
                ],
            )
            .with("robotics repository", vec![hit("Repo", "https://github.com/a/b")])
            .with("robotics research", vec![]);

        let fetcher = Fetcher::new(search, config());
        let window = Window::trailing(fixed_now(), 7);
        let dataset = aggregate(
            &fetcher,
            &["robotics".to_string()],
            &Category::ALL,
            window,
            fixed_now(),
        )
        .await;

        assert_eq!(
            dataset.counts(),
            vec![(Category::Social, 1), (Category::Code, 1), (Category::Paper, 0)]
        );
        assert!(dataset.partial_categories().is_empty());
        assert_eq!(dataset.topics, vec!["robotics"]);
        assert_eq!(dataset.window, window);
    }

    #[tokio::test]
    async fn test_failed_category_yields_empty_bucket() {
        let search =
            FakeSearch::default().with("robotics repository", vec![hit("Repo", "https://github.com/a/b")]);

        let fetcher = Fetcher::new(search, config());
        let dataset = aggregate(
            &fetcher,
            &["robotics".to_string()],
            &Category::ALL,
            Window::trailing(fixed_now(), 7),
            fixed_now(),
        )
        .await;

        assert_eq!(dataset.bucket(Category::Code).len(), 1);
        assert!(dataset.bucket(Category::Social).is_empty());
        assert!(dataset.bucket(Category::Paper).is_empty());
        assert_eq!(
            dataset.partial_categories(),
            vec![Category::Social, Category::Paper]
        );
        assert_eq!(
            summary_line(&dataset),
            "X/Twitter: 0 (partial) | GitHub: 1 | arXiv: 0 (partial)"
        );
    }

    #[tokio::test]
    async fn test_unrequested_categories_are_empty() {
        let search = FakeSearch::default().with("robotics research", vec![hit("P", "https://arxiv.org/abs/1")]);

        let fetcher = Fetcher::new(search, config());
        let dataset = aggregate(
            &fetcher,
            &["robotics".to_string()],
            &[Category::Paper, Category::Paper],
            Window::trailing(fixed_now(), 7),
            fixed_now(),
        )
        .await;

        assert_eq!(dataset.total_items(), 1);
        assert_eq!(dataset.bucket(Category::Social).len(), 0);
        assert!(!dataset.bucket(Category::Social).is_partial());
    }
}
