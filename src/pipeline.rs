//! Digest orchestration.
//!
//! Drives one run through fetch → analyze → render → persist → display.
//! Every stage after configuration degrades instead of failing: the run
//! always produces a [`Report`], and the report says what went wrong.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::{aggregate, Fetcher};
use crate::llm::{Analyzer, CompletionClient};
use crate::models::{Category, Dataset, Report, Window};
use crate::report::{render, ReportWriter};
use crate::search::SearchClient;

/// Which optional stages a run performs.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Write the markdown report.
    pub save_report: bool,
    /// Write the raw dataset JSON.
    pub save_raw: bool,
    /// Print the report to stdout.
    pub display: bool,
    /// Show a spinner while stages run.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            save_report: true,
            save_raw: false,
            display: true,
            show_progress: true,
        }
    }
}

/// Paths of artifacts that were written.
#[derive(Debug, Clone, Default)]
pub struct SavedArtifacts {
    pub report_path: Option<PathBuf>,
    pub raw_path: Option<PathBuf>,
}

/// Terminal result of a run.
#[derive(Debug)]
pub struct DigestOutcome {
    pub report: Report,
    pub markdown: String,
    pub saved: SavedArtifacts,
    /// Write failures; the report itself is unaffected.
    pub persistence_errors: Vec<String>,
}

/// Runs the digest pipeline with injected search and completion clients.
pub struct Orchestrator<S, C> {
    config: Config,
    fetcher: Fetcher<S>,
    analyzer: Analyzer<C>,
    writer: ReportWriter,
}

impl<S: SearchClient, C: CompletionClient> Orchestrator<S, C> {
    pub fn new(config: Config, search: S, completion: C) -> Self {
        let fetcher = Fetcher::new(search, config.search.clone());
        let analyzer = Analyzer::new(completion, config.model.clone(), config.report.clone());
        let writer = ReportWriter::new(&config.general.output_dir);

        Self {
            config,
            fetcher,
            analyzer,
            writer,
        }
    }

    /// Fetch the requested categories for the configured topics.
    pub async fn fetch_dataset(&self, categories: &[Category], now: DateTime<Utc>) -> Dataset {
        let window = Window::trailing(now, self.config.search.days_back);
        aggregate(
            &self.fetcher,
            &self.config.topics(),
            categories,
            window,
            now,
        )
        .await
    }

    /// Run the full pipeline at the current time.
    pub async fn run(&self, options: RunOptions) -> DigestOutcome {
        self.run_at(Utc::now(), options).await
    }

    /// Run the full pipeline as of `now`.
    pub async fn run_at(&self, now: DateTime<Utc>, options: RunOptions) -> DigestOutcome {
        let progress = spinner(options.show_progress);

        set_stage(&progress, "Fetching posts, repositories and papers...");
        let dataset = self.fetch_dataset(&Category::ALL, now).await;

        set_stage(&progress, "Analyzing with the language model...");
        let analysis = self.analyzer.analyze(&dataset).await;

        set_stage(&progress, "Rendering report...");
        let report = Report::new(now, dataset, analysis);
        let markdown = render(&report);

        if let Some(ref pb) = progress {
            pb.finish_and_clear();
        }

        if report.status.is_degraded() {
            warn!(
                "Run degraded (partial data: {}, analysis unavailable: {})",
                report.status.partial_data, report.status.analysis_unavailable
            );
        }

        let (saved, persistence_errors) = self.persist(&report, &markdown, options);

        if options.display {
            display_report(&markdown);
        }

        info!("Digest complete");

        DigestOutcome {
            report,
            markdown,
            saved,
            persistence_errors,
        }
    }

    /// Write the requested artifacts. Failures are collected, never raised.
    fn persist(
        &self,
        report: &Report,
        markdown: &str,
        options: RunOptions,
    ) -> (SavedArtifacts, Vec<String>) {
        let mut saved = SavedArtifacts::default();
        let mut errors = Vec::new();

        if options.save_report {
            match self.writer.save_markdown(markdown, report.generated_at) {
                Ok(path) => saved.report_path = Some(path),
                Err(e) => {
                    warn!("Failed to save report: {:#}", e);
                    errors.push(format!("{:#}", e));
                }
            }
        }

        if options.save_raw {
            match self.writer.save_raw(&report.dataset, report.generated_at) {
                Ok(path) => saved.raw_path = Some(path),
                Err(e) => {
                    warn!("Failed to save raw data: {:#}", e);
                    errors.push(format!("{:#}", e));
                }
            }
        }

        (saved, errors)
    }
}

fn spinner(show: bool) -> Option<ProgressBar> {
    if !show {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn set_stage(progress: &Option<ProgressBar>, message: &'static str) {
    info!("{}", message);
    if let Some(pb) = progress {
        pb.set_message(message);
    }
}

/// Print the rendered report between rules.
pub fn display_report(markdown: &str) {
    let rule = "=".repeat(80);
    println!("\n{}", rule);
    println!("{}", markdown);
    println!("{}\n", rule);
}
