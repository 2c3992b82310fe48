//! Dataset analysis with a language model.
//!
//! Builds one bounded prompt from a frozen [`Dataset`], sends it to the
//! completion endpoint and splits the reply into named sections. Any
//! failure degrades to a placeholder [`Analysis`]; this stage never aborts
//! the run.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};
use crate::config::{ModelConfig, ReportConfig};
use crate::models::{truncate_chars, Analysis, Bucket, Category, Dataset, SectionKind};

/// Token cap for per-category summaries.
const CATEGORY_SUMMARY_MAX_TOKENS: u32 = 1500;

/// Header level assigned to bold-only lines such as `**Summary**`.
const BOLD_HEADER_LEVEL: usize = 7;

/// System prompt for the digest analysis.
const SYSTEM_PROMPT: &str = r#"You are an expert AI/ML research analyst. Your job is to analyze
recent developments in AI, LLMs, and robotics, and compile a concise weekly digest.

Your report should:
1. Identify the most significant developments and trends
2. Group related items together thematically
3. Explain briefly why these developments matter
4. Cite every source you mention as a markdown link to its URL
5. Highlight breakthrough research or viral projects

Format the report in clean Markdown using exactly these section headers:
## Executive Summary
## Key Trends
## Notable Items
## What to Watch

Be concise but thorough. Focus on signal over noise."#;

/// Turns datasets into analyses through a completion client.
pub struct Analyzer<C> {
    client: C,
    model: ModelConfig,
    limits: ReportConfig,
}

impl<C: CompletionClient> Analyzer<C> {
    pub fn new(client: C, model: ModelConfig, limits: ReportConfig) -> Self {
        Self {
            client,
            model,
            limits,
        }
    }

    /// Analyze a frozen dataset. Never fails; degraded results carry a reason.
    pub async fn analyze(&self, dataset: &Dataset) -> Analysis {
        let fingerprint = dataset.fingerprint();
        let request = self.request(
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(self.build_prompt(dataset)),
            ],
            self.model.max_tokens,
        );

        info!(
            "Analyzing {} items with {}",
            dataset.total_items(),
            self.model.name
        );

        let analysis = match self.client.complete(&request).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Analysis unavailable: model returned an empty response");
                Analysis::unavailable(
                    &self.model.name,
                    fingerprint,
                    CompletionError::EmptyResponse.to_string(),
                )
            }
            Ok(text) => {
                let sections = parse_sections(&text);
                debug!("Parsed {} analysis sections", sections.len());
                Analysis::available(&self.model.name, fingerprint, sections)
            }
            Err(e) => {
                warn!("Analysis unavailable: {}", e);
                Analysis::unavailable(&self.model.name, fingerprint, e.to_string())
            }
        };

        if analysis.is_available() && self.limits.per_category_summaries {
            let summaries = self.summarize_categories(dataset).await;
            return analysis.with_category_summaries(summaries);
        }

        analysis
    }

    /// Build the user prompt for a dataset.
    pub fn build_prompt(&self, dataset: &Dataset) -> String {
        let days = (dataset.window.end - dataset.window.start).num_days();

        let mut prompt = String::new();
        prompt.push_str(&format!(
            "Please analyze the following data collected over the past {} days and compile \
             a digest with full citations and links.\n\n",
            days
        ));
        prompt.push_str(&format!("Topics: {}\n", dataset.topics.join(", ")));
        prompt.push_str(&format!("Date Range: {}\n\n", dataset.window));

        if dataset.total_items() == 0 {
            prompt.push_str("No items were collected for these topics in this window.\n\n");
        }

        for category in Category::ALL {
            let bucket = dataset.bucket(category);
            if bucket.is_empty() {
                continue;
            }
            prompt.push_str(&self.format_bucket(bucket));
        }

        prompt.push_str(
            "Compile the digest using the four section headers. \
             Cite every item you mention as a markdown link to its URL.",
        );

        prompt
    }

    /// One short summary per non-empty category. Failures are skipped.
    async fn summarize_categories(&self, dataset: &Dataset) -> BTreeMap<Category, String> {
        let mut summaries = BTreeMap::new();

        for category in Category::ALL {
            let bucket = dataset.bucket(category);
            if bucket.is_empty() {
                continue;
            }
            if let Some(summary) = self.summarize_category(bucket, &dataset.topics).await {
                summaries.insert(category, summary);
            }
        }

        summaries
    }

    /// Ask the model for a summary of a single category.
    pub async fn summarize_category(&self, bucket: &Bucket, topics: &[String]) -> Option<String> {
        if bucket.is_empty() {
            return None;
        }

        let prompt = format!(
            "Summarize the following {} about {}. Highlight the most important/trending items \
             and include URLs as citations.\n\n{}\nProvide a concise summary with key takeaways \
             and links to the most notable items.",
            bucket.category.label(),
            topics.join(", "),
            self.format_bucket(bucket)
        );

        let max_tokens = Some(
            self.model
                .max_tokens
                .map_or(CATEGORY_SUMMARY_MAX_TOKENS, |m| m.min(CATEGORY_SUMMARY_MAX_TOKENS)),
        );
        let request = self.request(vec![ChatMessage::user(prompt)], max_tokens);

        match self.client.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!("Empty summary for {}", bucket.category.label());
                None
            }
            Err(e) => {
                warn!("Error summarizing {}: {}", bucket.category.label(), e);
                None
            }
        }
    }

    fn request(&self, messages: Vec<ChatMessage>, max_tokens: Option<u32>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.name.clone(),
            messages,
            temperature: self.model.temperature,
            max_tokens,
        }
    }

    /// Format up to `max_items_per_category` items of a bucket for the prompt.
    fn format_bucket(&self, bucket: &Bucket) -> String {
        let shown = bucket.len().min(self.limits.max_items_per_category);

        let mut out = format!(
            "## {} (showing {} of {})\n",
            bucket.category.label(),
            shown,
            bucket.len()
        );

        for (i, item) in bucket.items.iter().take(shown).enumerate() {
            out.push_str(&format!("\n### Item {}\n", i + 1));
            out.push_str(&format!("- **Title**: {}\n", item.title));
            out.push_str(&format!("- **URL**: {}\n", item.url));
            out.push_str(&format!(
                "- **Date**: {}\n",
                item.short_date().unwrap_or("Unknown date")
            ));
            out.push_str(&format!("- **Topic**: {}\n", item.topic));
            if let Some(ref author) = item.author {
                out.push_str(&format!("- **Author**: {}\n", author));
            }
            let content = if item.snippet.is_empty() {
                "No content".to_string()
            } else {
                truncate_chars(&item.snippet, self.limits.max_snippet_chars)
            };
            out.push_str(&format!("- **Content**: {}\n", content.replace('\n', " ")));
            if !item.highlights.is_empty() {
                out.push_str(&format!(
                    "- **Key Highlights**: {}\n",
                    item.highlights.join(" | ").replace('\n', " ")
                ));
            }
        }

        out.push('\n');
        out
    }
}

/// Split a model reply into named sections.
///
/// Best-effort: headers are matched by alias in any order, text before the
/// first recognized header is dropped, and headers deeper than the first
/// recognized one stay part of the current section. A reply with no
/// recognized header becomes the executive summary.
pub fn parse_sections(text: &str) -> BTreeMap<SectionKind, String> {
    let mut collected: BTreeMap<SectionKind, Vec<&str>> = BTreeMap::new();
    let mut current: Option<SectionKind> = None;
    let mut section_level: Option<usize> = None;

    for line in text.lines() {
        if let Some((level, kind)) = match_header(line) {
            if section_level.map_or(true, |top| level <= top) {
                section_level.get_or_insert(level);
                current = Some(kind);
                collected.entry(kind).or_default();
                continue;
            }
        }

        if let Some(kind) = current {
            collected.entry(kind).or_default().push(line);
        }
    }

    if section_level.is_none() {
        let mut fallback = BTreeMap::new();
        let body = text.trim();
        if !body.is_empty() {
            fallback.insert(SectionKind::ExecutiveSummary, body.to_string());
        }
        return fallback;
    }

    collected
        .into_iter()
        .map(|(kind, lines)| (kind, lines.join("\n").trim().to_string()))
        .filter(|(_, body)| !body.is_empty())
        .collect()
}

/// Level and section of a header line that names a known section.
fn match_header(line: &str) -> Option<(usize, SectionKind)> {
    let (level, raw) = header_text(line)?;

    let normalized = raw
        .trim_start_matches(|c: char| !c.is_alphabetic())
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .to_lowercase();

    SectionKind::ALL
        .iter()
        .find(|kind| {
            kind.aliases().iter().any(|alias| {
                normalized == *alias
                    || normalized.starts_with(&format!("{} ", alias))
                    || normalized.starts_with(&format!("{}:", alias))
            })
        })
        .map(|kind| (level, *kind))
}

/// Extract the text of a markdown ATX header or a bold-only line.
fn header_text(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim();

    if trimmed.starts_with('#') {
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let rest = &trimmed[level..];
        if level > 6 || !(rest.is_empty() || rest.starts_with(' ')) {
            return None;
        }
        return Some((level, rest.trim().trim_end_matches('#').trim()));
    }

    let bold = trimmed.trim_end_matches(':');
    if bold.len() > 4 && bold.starts_with("**") && bold.ends_with("**") {
        return Some((BOLD_HEADER_LEVEL, &bold[2..bold.len() - 2]));
    }

    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::tests::{fixed_now, item};
    use crate::models::Window;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with canned text, or fails with a timeout when `reply` is None.
    pub(crate) struct FakeCompletion {
        pub reply: Option<String>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeCompletion {
        pub(crate) fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn timing_out() -> Self {
            Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .ok_or(CompletionError::Timeout { timeout_secs: 120 })
        }
    }

    pub(crate) const TWO_SECTION_REPLY: &str = "Here is your digest.\n\n\
        ## Executive Summary\n\
        Robotics had a busy week, led by [Robot post](https://x.com/p/1).\n\n\
        ## Key Trends\n\
        - Open-source manipulation stacks such as [a/b](https://github.com/a/b)\n";

    fn dataset() -> Dataset {
        Dataset::new(
            vec!["robotics".to_string()],
            Window::trailing(fixed_now(), 7),
            fixed_now(),
            vec![
                Bucket::new(
                    Category::Social,
                    vec![item(Category::Social, "Robot post", "https://x.com/p/1")],
                    Vec::new(),
                ),
                Bucket::new(
                    Category::Code,
                    vec![item(Category::Code, "a/b", "https://github.com/a/b")],
                    Vec::new(),
                ),
            ],
        )
    }

    fn analyzer(client: FakeCompletion) -> Analyzer<FakeCompletion> {
        Analyzer::new(client, ModelConfig::default(), ReportConfig::default())
    }

    #[test]
    fn test_parse_two_sections() {
        let sections = parse_sections(TWO_SECTION_REPLY);

        assert_eq!(sections.len(), 2);
        assert!(sections[&SectionKind::ExecutiveSummary].starts_with("Robotics had"));
        assert!(sections[&SectionKind::KeyTrends].contains("github.com/a/b"));
        assert!(!sections.contains_key(&SectionKind::WhatToWatch));
    }

    #[test]
    fn test_parse_header_order_variation() {
        let text = "# What to Watch\nHumanoids.\n# Key Themes/Trends\nAgents.\n# 📋 Executive Summary:\nBusy.";
        let sections = parse_sections(text);

        assert_eq!(sections[&SectionKind::WhatToWatch], "Humanoids.");
        assert_eq!(sections[&SectionKind::KeyTrends], "Agents.");
        assert_eq!(sections[&SectionKind::ExecutiveSummary], "Busy.");
        assert!(!sections.contains_key(&SectionKind::NotableItems));
    }

    #[test]
    fn test_parse_numbered_and_bold_headers() {
        let text = "**1. Executive Summary**\nShort.\n\n**Notable Items:**\n- [x](https://x.com/1)";
        let sections = parse_sections(text);

        assert_eq!(sections[&SectionKind::ExecutiveSummary], "Short.");
        assert_eq!(sections[&SectionKind::NotableItems], "- [x](https://x.com/1)");
    }

    #[test]
    fn test_parse_nested_headers_stay_in_section() {
        let text = "## Key Trends\nAgents.\n### Highlights\nMore agents.\n## Detailed Breakdown\nExtra.";
        let sections = parse_sections(text);

        assert_eq!(sections.len(), 1);
        let trends = &sections[&SectionKind::KeyTrends];
        assert!(trends.contains("### Highlights"));
        assert!(trends.contains("More agents."));
        assert!(trends.contains("Extra."));
    }

    #[test]
    fn test_parse_without_headers_falls_back() {
        let sections = parse_sections("Just a paragraph of analysis.");
        assert_eq!(
            sections[&SectionKind::ExecutiveSummary],
            "Just a paragraph of analysis."
        );
        assert!(parse_sections("  \n ").is_empty());
    }

    #[test]
    fn test_hashtag_is_not_a_header() {
        assert!(header_text("#summary of the week").is_none());
        assert_eq!(header_text("## Summary ##"), Some((2, "Summary")));
    }

    #[test]
    fn test_build_prompt_bounds_items() {
        let items = (0..20)
            .map(|i| {
                let mut it = item(Category::Paper, &format!("Paper {}", i), &format!("https://arxiv.org/abs/{}", i));
                it.snippet = "y".repeat(1000);
                it
            })
            .collect();
        let dataset = Dataset::new(
            vec!["LLM".to_string(), "robotics".to_string()],
            Window::trailing(fixed_now(), 7),
            fixed_now(),
            vec![Bucket::new(Category::Paper, items, Vec::new())],
        );

        let prompt = analyzer(FakeCompletion::replying("x")).build_prompt(&dataset);

        assert!(prompt.contains("past 7 days"));
        assert!(prompt.contains("Topics: LLM, robotics"));
        assert!(prompt.contains("Date Range: 2025-03-01 to 2025-03-08"));
        assert!(prompt.contains("## arXiv Papers (showing 15 of 20)"));
        assert!(prompt.contains("https://arxiv.org/abs/14"));
        assert!(!prompt.contains("https://arxiv.org/abs/15"));
        assert!(!prompt.contains(&"y".repeat(401)));
        assert!(!prompt.contains("X/Twitter Posts"));
    }

    #[test]
    fn test_build_prompt_empty_dataset() {
        let dataset = Dataset::new(
            vec!["robotics".to_string()],
            Window::trailing(fixed_now(), 7),
            fixed_now(),
            vec![],
        );
        let prompt = analyzer(FakeCompletion::replying("x")).build_prompt(&dataset);
        assert!(prompt.contains("No items were collected"));
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let dataset = dataset();
        let analyzer = analyzer(FakeCompletion::replying(TWO_SECTION_REPLY));
        let analysis = analyzer.analyze(&dataset).await;

        assert!(analysis.is_available());
        assert_eq!(analysis.populated_sections(), 2);
        assert_eq!(analysis.dataset_fingerprint, dataset.fingerprint());
        assert_eq!(analysis.model, "xiaomi/mimo-v2-flash:free");

        let requests = analyzer.client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].role, "system");
        assert_eq!(requests[0].temperature, 0.7);
        assert_eq!(requests[0].max_tokens, Some(4000));
        assert!(requests[0].messages[1].content.contains("https://x.com/p/1"));
    }

    #[tokio::test]
    async fn test_analyze_empty_reply_degrades() {
        let analysis = analyzer(FakeCompletion::replying("   ")).analyze(&dataset()).await;

        assert!(!analysis.is_available());
        assert_eq!(analysis.populated_sections(), 0);
        assert!(analysis.unavailable.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_analyze_timeout_degrades() {
        let analysis = analyzer(FakeCompletion::timing_out()).analyze(&dataset()).await;

        assert!(!analysis.is_available());
        assert!(analysis.unavailable.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_category_summaries() {
        let limits = ReportConfig {
            per_category_summaries: true,
            ..ReportConfig::default()
        };
        let analyzer = Analyzer::new(
            FakeCompletion::replying(TWO_SECTION_REPLY),
            ModelConfig::default(),
            limits,
        );

        let analysis = analyzer.analyze(&dataset()).await;

        // One digest call plus one per non-empty category.
        assert_eq!(analyzer.client.request_count(), 3);
        assert_eq!(analysis.category_summaries.len(), 2);
        assert!(analysis.category_summaries.contains_key(&Category::Social));
        assert!(!analysis.category_summaries.contains_key(&Category::Paper));

        let requests = analyzer.client.requests.lock().unwrap();
        assert_eq!(requests[1].max_tokens, Some(1500));
        assert_eq!(requests[1].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_no_category_summaries_when_degraded() {
        let limits = ReportConfig {
            per_category_summaries: true,
            ..ReportConfig::default()
        };
        let analyzer = Analyzer::new(FakeCompletion::timing_out(), ModelConfig::default(), limits);

        let analysis = analyzer.analyze(&dataset()).await;
        assert!(analysis.category_summaries.is_empty());
        assert_eq!(analyzer.client.request_count(), 1);
    }
}
