//! RecentNews - weekly AI/ML and robotics digest
//!
//! A CLI tool that searches X/Twitter, GitHub and arXiv through the Exa
//! search API, summarizes the results with a model on OpenRouter and
//! writes a Markdown report.
//!
//! Exit codes:
//!   0 - Run completed (including degraded runs with partial data or no analysis)
//!   1 - Invalid arguments, configuration error or missing API key

mod cli;
mod config;
mod fetch;
mod llm;
mod models;
mod pipeline;
mod report;
mod search;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, FetchSource};
use config::{Config, Credentials, KeyRequirement, CONFIG_FILE_NAME};
use fetch::{aggregate, plan_queries, summary_line, Fetcher};
use llm::OpenRouterClient;
use models::{Bucket, Category, Window};
use pipeline::{DigestOutcome, Orchestrator, RunOptions};
use search::ExaClient;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // API keys may live in a .env file
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    init_logging(&args);

    info!("RecentNews v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    let result = run(&args, |var| std::env::var(var).ok()).await;
    if let Err(ref e) = result {
        error!("Digest failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
    }

    std::process::exit(exit_code(&result));
}

/// Map a run result to the process exit code.
fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Handle --init-config: generate a default .recentnews.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize topics, model, search window, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected mode. Keys are resolved before any network call.
async fn run<F>(args: &Args, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    // Load configuration
    let mut config = load_config(args)?;
    config.merge_with_args(args);
    config.validate()?;

    // Handle --dry-run: print the plan and exit
    if args.dry_run {
        handle_dry_run(&config, args.fetch_only);
        return Ok(());
    }

    let requirement = if args.fetch_only.is_some() {
        KeyRequirement::SearchOnly
    } else {
        KeyRequirement::Full
    };
    let credentials = Credentials::resolve(lookup, requirement)?;
    debug!("Resolved credentials: {:?}", credentials);

    let search = ExaClient::new(credentials.exa_api_key.clone(), &config.search)?;

    if let Some(source) = args.fetch_only {
        return handle_fetch_only(&config, search, source).await;
    }

    let completion_key = credentials
        .openrouter_api_key
        .context("OpenRouter API key was not resolved")?;
    let completion = OpenRouterClient::new(completion_key, &config.model)?;

    println!("🚀 Building digest...");
    println!("   Topics: {}", config.topics().join(", "));
    println!("   Window: last {} days", config.search.days_back);
    println!("   Model: {}", config.model.name);
    println!("   Output: {}\n", config.general.output_dir);

    let options = RunOptions {
        save_report: !args.no_save,
        save_raw: args.save_raw,
        display: !args.no_display,
        show_progress: !args.quiet,
    };

    let orchestrator = Orchestrator::new(config, search, completion);
    let outcome = orchestrator.run(options).await;

    print_summary(&outcome);

    Ok(())
}

/// Print the post-run summary to the console.
fn print_summary(outcome: &DigestOutcome) {
    let status = &outcome.report.status;

    println!("\n📊 Data: {}", summary_line(&outcome.report.dataset));

    if status.partial_data {
        println!(
            "⚠️  Partial data: {} search queries failed",
            status.fetch_failures.len()
        );
    }
    if let Some(ref reason) = outcome.report.analysis.unavailable {
        println!("⚠️  Analysis unavailable: {}", reason);
    }

    if let Some(ref path) = outcome.saved.report_path {
        println!("📝 Report saved to: {}", path.display());
    }
    if let Some(ref path) = outcome.saved.raw_path {
        println!("💾 Raw data saved to: {}", path.display());
    }
    for err in &outcome.persistence_errors {
        eprintln!("❌ Could not save: {}", err);
    }

    println!("\n✅ Digest complete!");
}

/// Handle --fetch-only: fetch the selected sources and print them as JSON.
async fn handle_fetch_only(config: &Config, search: ExaClient, source: FetchSource) -> Result<()> {
    let categories = source.categories();
    let fetcher = Fetcher::new(search, config.search.clone());
    let now = Utc::now();

    let dataset = aggregate(
        &fetcher,
        &config.topics(),
        &categories,
        Window::trailing(now, config.search.days_back),
        now,
    )
    .await;

    let buckets: Vec<&Bucket> = categories.iter().map(|c| dataset.bucket(*c)).collect();
    let json = serde_json::to_string_pretty(&buckets).context("Failed to serialize fetched data")?;
    println!("{}", json);

    Ok(())
}

/// Handle --dry-run: print the queries that would be sent. No network calls.
fn handle_dry_run(config: &Config, fetch_only: Option<FetchSource>) {
    let categories = fetch_only.map_or_else(|| Category::ALL.to_vec(), |s| s.categories());
    let window = Window::trailing(Utc::now(), config.search.days_back);
    let topics = config.topics();

    println!("\n🔍 Dry run: no API calls will be made.\n");
    println!("   Window: {}", window);
    println!("   Results per query: {}", config.search.num_results);
    if fetch_only.is_none() {
        println!("   Model: {}", config.model.name);
    }

    for category in categories {
        let queries = plan_queries(&config.search, &topics, category);
        println!(
            "\n   {} {} ({} queries):",
            category.emoji(),
            category.label(),
            queries.len()
        );
        for (topic, query) in queries {
            println!("     - {}: {}", topic, query);
        }
    }

    println!("\n✅ Dry run complete.");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Ok(Config::load(config_path)?);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    /// Args pointing at a default config file inside `tmp` and an output dir next to it.
    fn args_in(tmp: &TempDir, extra: &[&str]) -> Args {
        args_with_config(tmp, &Config::default(), extra)
    }

    fn args_with_config(tmp: &TempDir, config: &Config, extra: &[&str]) -> Args {
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, toml::to_string_pretty(config).unwrap()).unwrap();
        let output_dir = tmp.path().join("reports");

        let mut argv = vec![
            "recentnews".to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
            "--output-dir".to_string(),
            output_dir.display().to_string(),
            "--no-display".to_string(),
            "--quiet".to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_missing_keys_abort_without_artifacts() {
        let tmp = TempDir::new().unwrap();
        let args = args_in(&tmp, &[]);

        let result = run(&args, |_| None).await;

        assert_eq!(exit_code(&result), 1);
        assert!(result.unwrap_err().to_string().contains("EXA_API_KEY"));
        assert!(!tmp.path().join("reports").exists());
    }

    #[tokio::test]
    async fn test_missing_completion_key_aborts() {
        let tmp = TempDir::new().unwrap();
        let args = args_in(&tmp, &[]);

        let result = run(&args, |var| (var == "EXA_API_KEY").then(|| "exa".to_string())).await;

        assert_eq!(exit_code(&result), 1);
        assert!(result.unwrap_err().to_string().contains("OPENROUTER_API_KEY"));
        assert!(!tmp.path().join("reports").exists());
    }

    #[tokio::test]
    async fn test_fetch_only_still_needs_search_key() {
        let tmp = TempDir::new().unwrap();
        let args = args_in(&tmp, &["--fetch-only", "code"]);

        let result = run(&args, |var| (var == "OPENROUTER_API_KEY").then(|| "or".to_string())).await;
        assert_eq!(exit_code(&result), 1);
    }

    #[tokio::test]
    async fn test_completion_timeout_still_exits_zero() {
        use serde_json::json;
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "title": "Robot arm",
                    "url": "https://github.com/owner/arm",
                    "publishedDate": "2025-03-05T00:00:00.000Z",
                    "text": "A robot arm"
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "choices": [{ "message": { "content": "## Summary\nlate" } }] }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.general.topics = vec!["robotics".to_string()];
        config.search.base_url = server.uri();
        config.search.retry_delay_ms = 0;
        config.model.base_url = server.uri();

        let tmp = TempDir::new().unwrap();
        let args = args_with_config(&tmp, &config, &["--timeout", "1"]);

        let result = run(&args, |_| Some("k".to_string())).await;
        assert_eq!(exit_code(&result), 0);

        let reports: Vec<_> = std::fs::read_dir(tmp.path().join("reports"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(reports.len(), 1);
        let markdown = std::fs::read_to_string(&reports[0]).unwrap();
        assert!(markdown.contains("_Analysis unavailable: Request timed out after 1s_"));
        assert!(markdown.contains("- [Robot arm](https://github.com/owner/arm)"));
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_keys() {
        let tmp = TempDir::new().unwrap();
        let args = args_in(&tmp, &["--dry-run"]);

        let result = run(&args, |_| None).await;

        assert_eq!(exit_code(&result), 0);
        assert!(!tmp.path().join("reports").exists());
    }

    #[tokio::test]
    async fn test_unreadable_config_fails() {
        let args = Args::try_parse_from(["recentnews", "--config", "/nonexistent/recentnews.toml"])
            .unwrap();
        let result = run(&args, |_| Some("key".to_string())).await;
        assert_eq!(exit_code(&result), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_values_fail() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("bad.toml");
        std::fs::write(&config_path, "[search]\ndays_back = 0\n").unwrap();

        let args = Args::try_parse_from([
            "recentnews".to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
        ])
        .unwrap();

        let result = run(&args, |_| Some("key".to_string())).await;
        assert!(result.unwrap_err().to_string().contains("days_back"));
    }
}
