//! Pipeline configuration.
//!
//! Secrets arrive through the CLI/environment (see [`crate::cli`]). Everything
//! else (topics, subreddits, limits, retry timing, endpoints) lives in an
//! optional YAML file. Every field has a default, so a partial file (or no file
//! at all) is valid.
//!
//! ```yaml
//! queries: ["machine learning", "AI startups"]
//! subreddits: ["MachineLearning"]
//! news_total_records: 20
//! batch_size: 5
//! endpoints:
//!   gemini: "http://localhost:8080"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

/// Errors that stop the pipeline before it does any work.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required credential {0} (set it in the environment or pass it as a flag)")]
    MissingSecret(&'static str),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Base URLs of the external services. Overridable for staging or local fakes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub news_api: String,
    pub reddit_auth: String,
    pub reddit_api: String,
    pub gemini: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            news_api: "https://newsapi.org".to_string(),
            reddit_auth: "https://www.reddit.com".to_string(),
            reddit_api: "https://oauth.reddit.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Tunables for one pipeline run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Search queries sent to the news API, in order.
    pub queries: Vec<String>,
    /// Subreddits scanned for relevant posts, in order.
    pub subreddits: Vec<String>,
    /// Phrases the relevance filter matches Reddit posts against, in priority order.
    pub topic_phrases: Vec<String>,
    pub news_total_records: usize,
    pub reddit_total_records: usize,
    pub news_pages_per_query: u32,
    pub news_page_size: u32,
    pub news_lookback_days: i64,
    pub news_request_delay_ms: u64,
    /// Records per sentiment request.
    pub batch_size: usize,
    /// Model attempts per batch before falling back to neutral.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Pause between batches.
    pub batch_pause_ms: u64,
    /// Gemini model name, without the `models/` prefix.
    pub model: String,
    pub endpoints: Endpoints,
}

/// The topics searched on NewsAPI and matched in Reddit posts.
pub fn default_topic_phrases() -> Vec<String> {
    [
        "artificial intelligence",
        "machine learning",
        "generative AI",
        "AI industry trends",
        "AI startups",
        "deep learning",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_subreddits() -> Vec<String> {
    [
        "generativeAI",
        "ArtificialIntelligence",
        "MachineLearning",
        "deep_learning",
        "datascience",
        "learnmachinelearning",
        "OpenAI",
        "GPT3",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queries: default_topic_phrases(),
            subreddits: default_subreddits(),
            topic_phrases: default_topic_phrases(),
            news_total_records: 50,
            reddit_total_records: 50,
            news_pages_per_query: 2,
            news_page_size: 20,
            news_lookback_days: 30,
            news_request_delay_ms: 1_000,
            batch_size: 10,
            max_retries: 3,
            retry_base_delay_ms: 5_000,
            retry_max_delay_ms: 60_000,
            batch_pause_ms: 300,
            model: "gemini-2.5-flash-lite".to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.news_page_size == 0 {
            return Err(ConfigError::Invalid("news_page_size must be at least 1".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        self.endpoints.validate()
    }
}

impl Endpoints {
    /// Every base must be an absolute http(s) URL.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, base) in [
            ("news_api", &self.news_api),
            ("reddit_auth", &self.reddit_auth),
            ("reddit_api", &self.reddit_api),
            ("gemini", &self.gemini),
        ] {
            let parsed = url::Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("endpoints.{name}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "endpoints.{name} must use http or https, got {}",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

/// Load the pipeline configuration from `path`, or the defaults when no path is given.
#[instrument(level = "info")]
pub fn load_config(path: Option<&str>) -> Result<PipelineConfig, ConfigError> {
    let config = match path {
        None => PipelineConfig::default(),
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: PathBuf::from(path),
                source,
            })?;
            let config: PipelineConfig = serde_yaml::from_str(&raw)?;
            info!(path, "Loaded configuration file");
            config
        }
    };
    config.validate()?;
    Ok(config)
}

/// Turn an optional credential into a hard requirement.
pub fn require_secret(name: &'static str, value: Option<&str>) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingSecret(name)),
    }
}
