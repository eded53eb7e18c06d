//! # AI Market Sentiment
//!
//! A sentiment pipeline for artificial-intelligence coverage: it collects news
//! articles and Reddit posts about AI topics, scores each one with a Gemini
//! model, writes the results as CSV and optionally posts Slack alerts.
//!
//! ## Usage
//!
//! ```sh
//! ai_market_sentiment run --data-dir ./data
//! ai_market_sentiment chart
//! ```
//!
//! ## Architecture
//!
//! The `run` command is a strictly sequential pipeline:
//! 1. **Collection**: NewsAPI search per query, Reddit `new` listings filtered by topic
//! 2. **Merge**: Concatenate sources, drop repeated URLs, write the raw table
//! 3. **Scoring**: Score records in fixed-size batches with retry and neutral fallback
//! 4. **Output**: Slack alert per record, then the scored table
//!
//! The `chart` command reads the scored table and renders a grouped bar chart.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod collectors;
mod config;
mod models;
mod notify;
mod outputs;
mod pipeline;
mod relevance;
mod sentiment;
mod utils;

use api::{Backoff, GeminiClient, TokioSleeper};
use cli::{ChartArgs, Cli, Command, RunArgs};
use collectors::news::NewsCollector;
use collectors::reddit::{RedditCollector, RedditCredentials};
use config::{PipelineConfig, load_config, require_secret};
use notify::SlackNotifier;
use outputs::chart;
use pipeline::{Limits, Sources};
use relevance::RelevanceFilter;
use sentiment::BatchScorer;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(config = ?args.config, command = ?args.command, "Parsed CLI arguments");

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Run(run) => run_pipeline(&config, &run).await,
        Command::Chart(chart_args) => run_chart(&chart_args).await,
    }
}

async fn run_pipeline(config: &PipelineConfig, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let start_time = Instant::now();
    info!("Starting AI market sentiment pipeline");

    ensure_writable_dir(&args.data_dir).await?;
    let data_dir = Path::new(&args.data_dir);

    // ---- Clients (missing credentials stop the run here) ----
    let news = NewsCollector::new(
        require_secret("NEWS_API_KEY", args.news_api_key.as_deref())?,
        config,
    )?;
    let reddit = RedditCollector::new(
        RedditCredentials {
            client_id: require_secret("REDDIT_CLIENT_ID", args.reddit_client_id.as_deref())?,
            client_secret: require_secret(
                "REDDIT_CLIENT_SECRET",
                args.reddit_client_secret.as_deref(),
            )?,
            user_agent: args.reddit_user_agent.clone(),
        },
        config,
    )?;
    let gemini = GeminiClient::new(
        require_secret("GEMINI_API_KEY", args.gemini_api_key.as_deref())?,
        config.model.clone(),
        &config.endpoints.gemini,
    )?;
    info!(model = gemini.model_name(), "Sentiment model configured");

    let scorer = BatchScorer::new(
        gemini,
        TokioSleeper,
        Backoff::new(
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        ),
    );
    let notifier = SlackNotifier::new(args.slack_webhook_url.clone());
    if !notifier.is_enabled() {
        info!("No Slack webhook configured; alerts disabled");
    }
    let filter = RelevanceFilter::new(&config.topic_phrases)?;
    if filter.is_empty() {
        warn!("No topic phrases configured; every Reddit post will be dropped");
    }
    debug!(phrases = filter.len(), "Relevance filter ready");

    let sources = Sources {
        news,
        reddit,
        filter,
    };
    let limits = Limits {
        news: args.news_limit.unwrap_or(config.news_total_records),
        reddit: args.reddit_limit.unwrap_or(config.reddit_total_records),
    };

    pipeline::run(config, &sources, &scorer, &notifier, limits, data_dir).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Pipeline complete"
    );
    Ok(())
}

async fn run_chart(args: &ChartArgs) -> Result<(), Box<dyn Error>> {
    let dist = chart::render_chart(Path::new(&args.input), Path::new(&args.output)).await?;
    info!(
        labels = dist.labels.len(),
        platforms = dist.platforms.len(),
        output = %args.output,
        "Chart rendered"
    );
    Ok(())
}
