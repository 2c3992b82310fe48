//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Flags left unset fall back to the
//! configuration file.

use clap::Parser;
use std::path::PathBuf;

use crate::models::Category;

/// RecentNews - weekly AI/ML and robotics digest
///
/// Searches X/Twitter, GitHub and arXiv for recent items on your topics,
/// summarizes them with a language model and writes a Markdown report.
///
/// Examples:
///   recentnews
///   recentnews --topics "robotics" "world models" --days-back 3
///   recentnews --fetch-only paper
///   recentnews --dry-run
///   recentnews --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Topics to search for (space-separated)
    ///
    /// Defaults to the topics in .recentnews.toml, or the built-in list.
    #[arg(short, long, value_name = "TOPIC", num_args = 1..)]
    pub topics: Option<Vec<String>>,

    /// Do not save the report to a file
    #[arg(long)]
    pub no_save: bool,

    /// Also save the raw fetched data as JSON
    #[arg(long)]
    pub save_raw: bool,

    /// Do not print the report to the console
    #[arg(long)]
    pub no_display: bool,

    /// Directory where reports are written
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Model identifier on OpenRouter
    ///
    /// Can also be set via RECENTNEWS_MODEL env var or .recentnews.toml config.
    #[arg(short, long, value_name = "ID", env = "RECENTNEWS_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature for the model (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Number of days to look back
    #[arg(long, value_name = "DAYS")]
    pub days_back: Option<u32>,

    /// Results requested per search query
    #[arg(long, value_name = "COUNT")]
    pub num_results: Option<usize>,

    /// Model request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .recentnews.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Fetch one source without analysis and print it as JSON
    ///
    /// Only EXA_API_KEY is required in this mode.
    #[arg(long, value_name = "SOURCE")]
    pub fetch_only: Option<FetchSource>,

    /// Dry run: print the queries and window without calling any API
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .recentnews.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Source selection for --fetch-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FetchSource {
    /// X/Twitter posts
    Social,
    /// GitHub repositories
    Code,
    /// arXiv papers
    Paper,
    /// All three sources
    All,
}

impl FetchSource {
    /// Categories covered by this source selection.
    pub fn categories(&self) -> Vec<Category> {
        match self {
            FetchSource::Social => vec![Category::Social],
            FetchSource::Code => vec![Category::Code],
            FetchSource::Paper => vec![Category::Paper],
            FetchSource::All => Category::ALL.to_vec(),
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref topics) = self.topics {
            if topics.iter().all(|t| t.trim().is_empty()) {
                return Err("At least one non-empty topic is required".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.days_back == Some(0) {
            return Err("Days back must be at least 1".to_string());
        }

        if self.num_results == Some(0) {
            return Err("Number of results must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["recentnews"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_leave_config_in_charge() {
        let args = parse(&[]);
        assert!(args.topics.is_none());
        assert!(args.output_dir.is_none());
        assert!(args.temperature.is_none());
        assert!(!args.no_save);
        assert!(!args.save_raw);
        assert!(!args.no_display);
        assert!(args.fetch_only.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_multiple_topics() {
        let args = parse(&["--topics", "robotics", "world models", "--days-back", "3"]);
        assert_eq!(
            args.topics,
            Some(vec!["robotics".to_string(), "world models".to_string()])
        );
        assert_eq!(args.days_back, Some(3));
    }

    #[test]
    fn test_fetch_only_sources() {
        let args = parse(&["--fetch-only", "paper"]);
        assert_eq!(args.fetch_only, Some(FetchSource::Paper));
        assert_eq!(FetchSource::Paper.categories(), vec![Category::Paper]);
        assert_eq!(FetchSource::All.categories().len(), 3);

        assert!(Args::try_parse_from(["recentnews", "--fetch-only", "blogs"]).is_err());
    }

    #[test]
    fn test_validation_temperature() {
        let mut args = parse(&[]);
        args.temperature = Some(2.5);
        assert!(args.validate().is_err());

        args.temperature = Some(1.2);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_values() {
        assert!(parse(&["--days-back", "0"]).validate().is_err());
        assert!(parse(&["--num-results", "0"]).validate().is_err());
        assert!(parse(&["--timeout", "0"]).validate().is_err());
        assert!(parse(&["--topics", " "]).validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let args = parse(&["--init-config", "--verbose", "--quiet"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&[]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
