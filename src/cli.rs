//! Command-line interface definitions for the AI market sentiment pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials can be provided via command-line flags or environment variables.

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the AI market sentiment pipeline.
///
/// # Examples
///
/// ```sh
/// # Collect, score and persist (credentials from the environment)
/// ai_market_sentiment run --data-dir ./data
///
/// # Smaller run with a custom topic list
/// ai_market_sentiment --config topics.yaml run --news-limit 10 --reddit-limit 10
///
/// # Chart the last run
/// ai_market_sentiment chart -i ./data/analyzed_ai_market_data.csv -o ./data/sentiment.svg
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file (topics, subreddits, limits, retry timing)
    #[arg(short, long, global = true, env = "AI_SENTIMENT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect news and Reddit posts, score their sentiment and write the CSV tables
    Run(RunArgs),
    /// Render the scored CSV table as a grouped bar chart
    Chart(ChartArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory for the raw and scored CSV tables
    #[arg(short, long, default_value = "./data")]
    pub data_dir: String,

    /// Maximum number of news articles (overrides the config file)
    #[arg(long)]
    pub news_limit: Option<usize>,

    /// Maximum number of Reddit posts (overrides the config file)
    #[arg(long)]
    pub reddit_limit: Option<usize>,

    /// Google Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// Reddit application client id
    #[arg(long, env = "REDDIT_CLIENT_ID")]
    pub reddit_client_id: Option<String>,

    /// Reddit application client secret
    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub reddit_client_secret: Option<String>,

    /// User agent sent to Reddit
    #[arg(long, env = "REDDIT_USER_AGENT", default_value = "ai-sentiment-bot")]
    pub reddit_user_agent: String,

    /// Slack incoming webhook; alerts are skipped when unset
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ChartArgs {
    /// Scored CSV table to read
    #[arg(short, long, default_value = "./data/analyzed_ai_market_data.csv")]
    pub input: String,

    /// SVG file to write
    #[arg(short, long, default_value = "./data/sentiment_distribution.svg")]
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parsing() {
        let cli = Cli::parse_from([
            "ai_market_sentiment",
            "run",
            "--data-dir",
            "/tmp/data",
            "--news-limit",
            "5",
            "--gemini-api-key",
            "g",
        ]);

        match cli.command {
            Command::Run(run) => {
                assert_eq!(run.data_dir, "/tmp/data");
                assert_eq!(run.news_limit, Some(5));
                assert_eq!(run.reddit_limit, None);
                assert_eq!(run.gemini_api_key.as_deref(), Some("g"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["ai_market_sentiment", "run", "-c", "topics.yaml"]);
        assert_eq!(cli.config.as_deref(), Some("topics.yaml"));
    }

    #[test]
    fn test_chart_short_flags() {
        let cli = Cli::parse_from([
            "ai_market_sentiment",
            "chart",
            "-i",
            "/tmp/in.csv",
            "-o",
            "/tmp/out.svg",
        ]);

        match cli.command {
            Command::Chart(chart) => {
                assert_eq!(chart.input, "/tmp/in.csv");
                assert_eq!(chart.output, "/tmp/out.svg");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
