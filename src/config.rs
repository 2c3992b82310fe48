//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.recentnews.toml` files, and resolving API keys from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Category;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".recentnews.toml";

/// Environment variable holding the Exa API key.
pub const EXA_API_KEY_VAR: &str = "EXA_API_KEY";

/// Environment variable holding the OpenRouter API key.
pub const OPENROUTER_API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Errors that abort a run before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} not set. Please add it to your environment or .env file.")]
    MissingApiKey { var: &'static str },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Search API settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory where reports are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Topics to search for.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            topics: default_topics(),
        }
    }
}

fn default_output_dir() -> String {
    "reports".to_string()
}

fn default_topics() -> Vec<String> {
    vec![
        "LLM",
        "large language model",
        "AI artificial intelligence",
        "robotics",
        "machine learning",
        "neural network",
        "GPT",
        "transformer model",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Exa API base URL.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Results requested per query.
    #[serde(default = "default_num_results")]
    pub num_results: usize,

    /// Length of the trailing window in days.
    #[serde(default = "default_days_back")]
    pub days_back: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// Retries for rate-limited or timed-out queries.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Delay between retries in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Number of topics queried for social posts.
    #[serde(default = "default_social_topics")]
    pub social_topics: usize,

    /// Number of topics queried for repositories.
    #[serde(default = "default_code_topics")]
    pub code_topics: usize,

    /// Number of topics queried for papers.
    #[serde(default = "default_paper_topics")]
    pub paper_topics: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            num_results: default_num_results(),
            days_back: default_days_back(),
            timeout_seconds: default_search_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            social_topics: default_social_topics(),
            code_topics: default_code_topics(),
            paper_topics: default_paper_topics(),
        }
    }
}

impl SearchConfig {
    /// How many of the configured topics are queried for a category.
    pub fn topic_limit(&self, category: Category) -> usize {
        match category {
            Category::Social => self.social_topics,
            Category::Code => self.code_topics,
            Category::Paper => self.paper_topics,
        }
    }
}

fn default_search_url() -> String {
    "https://api.exa.ai".to_string()
}

fn default_num_results() -> usize {
    10
}

fn default_days_back() -> u32 {
    7
}

fn default_search_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    1
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_social_topics() -> usize {
    3
}

fn default_code_topics() -> usize {
    3
}

fn default_paper_topics() -> usize {
    4
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_model_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub name: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_url(),
            name: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

fn default_model_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "xiaomi/mimo-v2-flash:free".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> Option<u32> {
    Some(4000)
}

fn default_model_timeout() -> u64 {
    120
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Items per category included in the prompt.
    #[serde(default = "default_max_items")]
    pub max_items_per_category: usize,

    /// Characters of item content included in the prompt.
    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,

    /// Ask the model for a short summary of each category.
    #[serde(default)]
    pub per_category_summaries: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_items_per_category: default_max_items(),
            max_snippet_chars: default_max_snippet_chars(),
            per_category_summaries: false,
        }
    }
}

fn default_max_items() -> usize {
    15
}

fn default_max_snippet_chars() -> usize {
    400
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values explicitly provided on the command line override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref topics) = args.topics {
            self.general.topics = topics.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(days) = args.days_back {
            self.search.days_back = days;
        }
        if let Some(num) = args.num_results {
            self.search.num_results = num;
        }
    }

    /// Check values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("at least one topic is required".into()));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.search.num_results == 0 {
            return Err(ConfigError::Invalid("num_results must be at least 1".into()));
        }
        if self.search.days_back == 0 {
            return Err(ConfigError::Invalid("days_back must be at least 1".into()));
        }
        if self.search.timeout_seconds == 0 || self.model.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    /// Topics with surrounding whitespace removed and blanks dropped.
    pub fn topics(&self) -> Vec<String> {
        self.general
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Which API keys a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRequirement {
    /// Search and completion keys.
    Full,
    /// Only the search key (fetch-only runs).
    SearchOnly,
}

/// API keys resolved at startup.
#[derive(Clone)]
pub struct Credentials {
    pub exa_api_key: String,
    pub openrouter_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("exa_api_key", &"***")
            .field(
                "openrouter_api_key",
                &self.openrouter_api_key.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

impl Credentials {
    /// Resolve keys through a lookup function. Blank values count as missing.
    pub fn resolve<F>(lookup: F, requirement: KeyRequirement) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let exa_api_key = get(EXA_API_KEY_VAR).ok_or(ConfigError::MissingApiKey {
            var: EXA_API_KEY_VAR,
        })?;

        let openrouter_api_key = match requirement {
            KeyRequirement::Full => Some(get(OPENROUTER_API_KEY_VAR).ok_or(
                ConfigError::MissingApiKey {
                    var: OPENROUTER_API_KEY_VAR,
                },
            )?),
            KeyRequirement::SearchOnly => get(OPENROUTER_API_KEY_VAR),
        };

        Ok(Self {
            exa_api_key,
            openrouter_api_key,
        })
    }
}
