//! Data models for the digest pipeline.
//!
//! This module contains the core data structures that flow through the
//! fetch → analyze → render stages: items, category buckets, the frozen
//! dataset, the model's analysis, and the final report.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Source category of a fetched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Posts from X/Twitter
    Social,
    /// GitHub repositories
    Code,
    /// arXiv papers
    Paper,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Social => write!(f, "X/Twitter"),
            Category::Code => write!(f, "GitHub"),
            Category::Paper => write!(f, "arXiv"),
        }
    }
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 3] = [Category::Social, Category::Code, Category::Paper];

    /// Human-readable label used in tables and section headers.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Social => "X/Twitter Posts",
            Category::Code => "GitHub Repositories",
            Category::Paper => "arXiv Papers",
        }
    }

    /// Returns an emoji representation of the category.
    pub fn emoji(&self) -> &'static str {
        match self {
            Category::Social => "💬",
            Category::Code => "💻",
            Category::Paper => "📄",
        }
    }

    /// Builds the site-restricted search query for a topic.
    pub fn query_for(&self, topic: &str) -> String {
        match self {
            Category::Social => format!(
                "{} AI breakthrough OR announcement site:twitter.com OR site:x.com",
                topic
            ),
            Category::Code => format!("{} repository stars site:github.com", topic),
            Category::Paper => format!("{} research paper site:arxiv.org", topic),
        }
    }

    /// Maximum snippet length kept from a search hit.
    pub fn snippet_chars(&self) -> usize {
        match self {
            Category::Social | Category::Code => 500,
            Category::Paper => 800,
        }
    }
}

/// One retrieved unit (post, repository or paper).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    pub category: Category,
    /// Topic whose query surfaced this item.
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Item {
    /// Key used for deduplication within a bucket.
    pub fn dedup_key(&self) -> String {
        normalize_url(&self.url)
    }

    /// Returns the published date trimmed to `YYYY-MM-DD` when possible.
    pub fn short_date(&self) -> Option<&str> {
        self.published_date
            .as_deref()
            .map(|d| d.get(..10).unwrap_or(d))
    }
}

/// Normalizes a URL for equality checks (whitespace and trailing slash).
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// A search query that failed for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub category: Category,
    pub topic: String,
    pub message: String,
}

/// Deduplicated items for one source category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub category: Category,
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FetchFailure>,
}

impl Bucket {
    /// Builds a bucket, keeping the first item seen for each URL.
    pub fn new(category: Category, items: Vec<Item>, failures: Vec<FetchFailure>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.dedup_key()))
            .collect();

        Self {
            category,
            items,
            failures,
        }
    }

    /// An empty bucket with no recorded failures.
    pub fn empty(category: Category) -> Self {
        Self::new(category, Vec::new(), Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when at least one topic query failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Trailing date range used to bound freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    /// The `days`-long window ending on the date of `end`.
    pub fn trailing(end: DateTime<Utc>, days: u32) -> Self {
        let end = end.date_naive();
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    /// Start of the window as an ISO 8601 timestamp.
    pub fn start_timestamp(&self) -> String {
        format!("{}T00:00:00.000Z", self.start.format("%Y-%m-%d"))
    }

    /// End of the window as an ISO 8601 timestamp.
    pub fn end_timestamp(&self) -> String {
        format!("{}T23:59:59.999Z", self.end.format("%Y-%m-%d"))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// All fetched buckets for one run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub topics: Vec<String>,
    pub window: Window,
    pub fetched_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_buckets")]
    pub buckets: BTreeMap<Category, Bucket>,
}

/// Reads a bucket map, adding empty buckets for any missing category.
fn deserialize_buckets<'de, D>(deserializer: D) -> Result<BTreeMap<Category, Bucket>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut buckets = BTreeMap::<Category, Bucket>::deserialize(deserializer)?;
    for category in Category::ALL {
        buckets
            .entry(category)
            .or_insert_with(|| Bucket::empty(category));
    }
    Ok(buckets)
}

const fn empty_bucket(category: Category) -> Bucket {
    Bucket {
        category,
        items: Vec::new(),
        failures: Vec::new(),
    }
}

static EMPTY_BUCKETS: [Bucket; 3] = [
    empty_bucket(Category::Social),
    empty_bucket(Category::Code),
    empty_bucket(Category::Paper),
];

impl Dataset {
    /// Creates a dataset; categories without a bucket get an empty one.
    pub fn new(
        topics: Vec<String>,
        window: Window,
        fetched_at: DateTime<Utc>,
        buckets: Vec<Bucket>,
    ) -> Self {
        let mut map: BTreeMap<Category, Bucket> = Category::ALL
            .iter()
            .map(|c| (*c, Bucket::empty(*c)))
            .collect();

        for bucket in buckets {
            map.insert(bucket.category, bucket);
        }

        Self {
            topics,
            window,
            fetched_at,
            buckets: map,
        }
    }

    /// Returns the bucket for a category, or an empty one if it is missing.
    pub fn bucket(&self, category: Category) -> &Bucket {
        self.buckets.get(&category).unwrap_or_else(|| {
            let index = match category {
                Category::Social => 0,
                Category::Code => 1,
                Category::Paper => 2,
            };
            &EMPTY_BUCKETS[index]
        })
    }

    /// Item count per category, in report order.
    pub fn counts(&self) -> Vec<(Category, usize)> {
        Category::ALL
            .iter()
            .map(|c| (*c, self.bucket(*c).len()))
            .collect()
    }

    pub fn total_items(&self) -> usize {
        self.buckets.values().map(Bucket::len).sum()
    }

    /// Categories where at least one query failed.
    pub fn partial_categories(&self) -> Vec<Category> {
        self.buckets
            .values()
            .filter(|b| b.is_partial())
            .map(|b| b.category)
            .collect()
    }

    /// All recorded fetch failures.
    pub fn failures(&self) -> Vec<FetchFailure> {
        self.buckets
            .values()
            .flat_map(|b| b.failures.iter().cloned())
            .collect()
    }

    /// Identifies this snapshot by its window and item URLs.
    ///
    /// Stable within a process; not meant to be persisted across builds.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.window.start.hash(&mut hasher);
        self.window.end.hash(&mut hasher);
        for bucket in self.buckets.values() {
            bucket.category.hash(&mut hasher);
            for item in &bucket.items {
                item.dedup_key().hash(&mut hasher);
            }
        }
        format!("{:016x}", hasher.finish())
    }
}

/// Named section of the model's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ExecutiveSummary,
    KeyTrends,
    NotableItems,
    WhatToWatch,
}

impl SectionKind {
    /// All sections in report order.
    pub const ALL: [SectionKind; 4] = [
        SectionKind::ExecutiveSummary,
        SectionKind::KeyTrends,
        SectionKind::NotableItems,
        SectionKind::WhatToWatch,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::ExecutiveSummary => "Executive Summary",
            SectionKind::KeyTrends => "Key Trends",
            SectionKind::NotableItems => "Notable Items",
            SectionKind::WhatToWatch => "What to Watch",
        }
    }

    /// Lowercase header texts accepted for this section.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            SectionKind::ExecutiveSummary => &["executive summary", "summary", "tl;dr"],
            SectionKind::KeyTrends => &[
                "key trends",
                "key themes/trends",
                "key themes",
                "trends",
                "themes",
            ],
            SectionKind::NotableItems => {
                &["notable items", "notable developments", "highlights"]
            }
            SectionKind::WhatToWatch => &["what to watch", "emerging trends to watch", "outlook"],
        }
    }
}

/// Structured output of the language model for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Model identifier used for the completion.
    pub model: String,
    /// Fingerprint of the dataset this analysis was derived from.
    pub dataset_fingerprint: String,
    pub sections: BTreeMap<SectionKind, String>,
    /// Reason the analysis is unavailable, if it degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_summaries: BTreeMap<Category, String>,
}

impl Analysis {
    /// A successful analysis. Blank sections are dropped.
    pub fn available(
        model: impl Into<String>,
        dataset_fingerprint: impl Into<String>,
        sections: BTreeMap<SectionKind, String>,
    ) -> Self {
        let sections = sections
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();

        Self {
            model: model.into(),
            dataset_fingerprint: dataset_fingerprint.into(),
            sections,
            unavailable: None,
            category_summaries: BTreeMap::new(),
        }
    }

    /// A placeholder analysis recording why the model call failed.
    pub fn unavailable(
        model: impl Into<String>,
        dataset_fingerprint: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            dataset_fingerprint: dataset_fingerprint.into(),
            sections: BTreeMap::new(),
            unavailable: Some(reason.into()),
            category_summaries: BTreeMap::new(),
        }
    }

    /// Attaches per-category summaries.
    pub fn with_category_summaries(mut self, summaries: BTreeMap<Category, String>) -> Self {
        self.category_summaries = summaries;
        self
    }

    pub fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }

    /// Text of a section, if the model produced it.
    pub fn section(&self, kind: SectionKind) -> Option<&str> {
        self.sections.get(&kind).map(String::as_str)
    }

    pub fn populated_sections(&self) -> usize {
        self.sections.len()
    }
}

/// Which stages of a run degraded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// At least one topic query failed.
    pub partial_data: bool,
    /// The analysis fell back to placeholders.
    pub analysis_unavailable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch_failures: Vec<FetchFailure>,
}

impl RunStatus {
    /// Derives the status from a dataset and its analysis.
    pub fn from_stages(dataset: &Dataset, analysis: &Analysis) -> Self {
        let fetch_failures = dataset.failures();
        Self {
            partial_data: !fetch_failures.is_empty(),
            analysis_unavailable: !analysis.is_available(),
            fetch_failures,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.partial_data || self.analysis_unavailable
    }
}

/// The complete digest report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub dataset: Dataset,
    pub analysis: Analysis,
    pub status: RunStatus,
}

impl Report {
    /// Assembles a report; the status is derived from the stages.
    pub fn new(generated_at: DateTime<Utc>, dataset: Dataset, analysis: Analysis) -> Self {
        let status = RunStatus::from_stages(&dataset, &analysis);
        Self {
            generated_at,
            dataset,
            analysis,
            status,
        }
    }
}

/// Truncates to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
