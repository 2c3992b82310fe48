//! Markdown report generation.
//!
//! This module renders a [`Report`] into the digest markdown and the
//! raw dataset into JSON. Rendering is a pure function of the report;
//! the only time-dependent line is the generation timestamp.

use crate::models::{Analysis, Bucket, Category, Dataset, Item, Report, SectionKind};
use anyhow::{Context, Result};

/// Generate the complete Markdown digest.
pub fn render(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&generate_header(report));

    // Degraded-state notices
    output.push_str(&generate_status_notices(report));

    // Counts per category
    output.push_str(&generate_data_summary(&report.dataset));

    // Model sections
    output.push_str(&generate_analysis_sections(&report.analysis));

    // Every collected item
    output.push_str(&generate_sources_section(&report.dataset, &report.analysis));

    output.push_str(&generate_methodology(report));

    output.push_str(&generate_footer());

    output
}

/// Serialize the frozen dataset for the raw-data artifact.
pub fn render_raw_json(dataset: &Dataset) -> Result<String> {
    serde_json::to_string_pretty(dataset).context("Failed to serialize raw dataset")
}

/// Generate the title block.
fn generate_header(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("# 🤖 AI/ML Weekly Digest\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Window:** {}\n", report.dataset.window));
    section.push_str(&format!(
        "- **Topics:** {}\n",
        report.dataset.topics.join(", ")
    ));
    section.push_str(&format!("- **Model:** `{}`\n", report.analysis.model));
    section.push('\n');

    section
}

/// Generate the partial-data and analysis-unavailable notices.
fn generate_status_notices(report: &Report) -> String {
    let mut section = String::new();

    if report.status.partial_data {
        let names: Vec<String> = report
            .dataset
            .partial_categories()
            .iter()
            .map(|c| c.to_string())
            .collect();

        section.push_str(&format!(
            "> ⚠️ **Partial data:** some searches failed for {}. Counts below may be incomplete.\n",
            names.join(", ")
        ));
    }

    if report.status.analysis_unavailable {
        section.push_str(&format!(
            "> ⚠️ **Analysis unavailable:** {}. The collected items are listed below.\n",
            unavailable_reason(&report.analysis)
        ));
    }

    if !section.is_empty() {
        section.push('\n');
    }

    section
}

/// Generate the per-category count table.
fn generate_data_summary(dataset: &Dataset) -> String {
    let mut section = String::new();

    section.push_str("## 📊 Data Summary\n\n");
    section.push_str("| Source | Items | Status |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for (category, count) in dataset.counts() {
        let status = if dataset.bucket(category).is_partial() {
            "partial"
        } else {
            "ok"
        };
        section.push_str(&format!(
            "| {} {} | {} | {} |\n",
            category.emoji(),
            category.label(),
            count,
            status
        ));
    }

    section.push_str(&format!(
        "| **Total** | **{}** | |\n\n",
        dataset.total_items()
    ));

    section
}

/// Generate the four analysis sections in fixed order.
fn generate_analysis_sections(analysis: &Analysis) -> String {
    let mut section = String::new();

    for kind in SectionKind::ALL {
        section.push_str(&format!("## {}\n\n", kind.title()));

        if !analysis.is_available() {
            section.push_str(&format!(
                "_Analysis unavailable: {}_\n\n",
                unavailable_reason(analysis)
            ));
            continue;
        }

        match analysis.section(kind) {
            Some(text) => {
                section.push_str(text.trim());
                section.push_str("\n\n");
            }
            None => section.push_str("_No content for this section._\n\n"),
        }
    }

    section
}

/// Generate the item listing, one subsection per category.
fn generate_sources_section(dataset: &Dataset, analysis: &Analysis) -> String {
    let mut section = String::new();

    section.push_str("## 🔗 Sources\n\n");

    for category in Category::ALL {
        section.push_str(&generate_bucket_listing(
            dataset.bucket(category),
            analysis.category_summaries.get(&category),
        ));
    }

    section
}

fn generate_bucket_listing(bucket: &Bucket, summary: Option<&String>) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "### {} {}\n\n",
        bucket.category.emoji(),
        bucket.category.label()
    ));

    if let Some(summary) = summary {
        section.push_str(summary.trim());
        section.push_str("\n\n");
    }

    if bucket.is_partial() {
        let failed = bucket.failures.len();
        section.push_str(&format!(
            "_Partial: {} {} failed._\n\n",
            failed,
            if failed == 1 { "search" } else { "searches" }
        ));
    }

    if bucket.is_empty() {
        section.push_str("_No items collected._\n\n");
        return section;
    }

    for item in &bucket.items {
        section.push_str(&format_item_line(item));
    }
    section.push('\n');

    section
}

/// A single `- [title](url)` line with whatever details the item has.
fn format_item_line(item: &Item) -> String {
    let mut details = Vec::new();

    if let Some(ref author) = item.author {
        details.push(format!("by {}", author));
    }
    if let Some(stars) = item.stars {
        details.push(format!("⭐ {}", stars));
    }
    if let Some(date) = item.short_date() {
        details.push(date.to_string());
    }

    let mut line = format!(
        "- [{}]({})",
        escape_link_text(&item.title),
        escape_link_url(&item.url)
    );
    if !details.is_empty() {
        line.push_str(&format!(" · {}", details.join(" · ")));
    }
    line.push('\n');

    line
}

/// Generate the methodology note.
fn generate_methodology(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Methodology\n\n");
    section.push_str(&format!(
        "Items published between {} were collected with site-restricted searches \
         for each topic, deduplicated by URL within each source, and summarized \
         by `{}`. Every item the searches returned is listed under Sources.\n\n",
        report.dataset.window, report.analysis.model
    ));

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by recentnews*\n");

    footer
}

fn unavailable_reason(analysis: &Analysis) -> &str {
    analysis.unavailable.as_deref().unwrap_or("unknown error")
}

fn escape_link_text(text: &str) -> String {
    // Backslashes first, or the escaped brackets get doubled.
    text.replace('\\', "\\\\")
        .replace('[', "\\[")
        .replace(']', "\\]")
}

fn escape_link_url(url: &str) -> String {
    url.trim()
        .replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}
