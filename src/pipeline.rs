//! Pipeline stages between collection and persistence.
//!
//! - [`merge_records`]: concatenate collector output, dropping repeated URLs
//! - [`platform_counts`]: per-platform tallies for the run summary
//! - [`score_records`]: chunk records, score each chunk, notify per record
//! - [`run`]: the whole `run` command once clients are built
//!
//! Everything runs sequentially; verdicts are zipped back onto records by
//! position, so chunk order and in-chunk order are preserved end to end.

use crate::api::{AskAsync, Sleeper};
use crate::collectors::news::NewsCollector;
use crate::collectors::reddit::RedditCollector;
use crate::config::PipelineConfig;
use crate::models::{Platform, Record, ScoredRecord};
use crate::notify::SlackNotifier;
use crate::outputs::tables;
use crate::relevance::RelevanceFilter;
use crate::sentiment::BatchScorer;
use itertools::Itertools;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Both record sources plus the filter applied to discussion posts.
#[derive(Debug)]
pub struct Sources {
    pub news: NewsCollector,
    pub reddit: RedditCollector,
    pub filter: RelevanceFilter,
}

/// Record caps for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub news: usize,
    pub reddit: usize,
}

/// Concatenate record sets in order, keeping the first record for any URL.
///
/// Records without a URL are never treated as duplicates of each other.
pub fn merge_records<I>(sources: I) -> Vec<Record>
where
    I: IntoIterator<Item = Vec<Record>>,
{
    let mut seen = HashSet::new();
    let mut dropped = 0usize;
    let merged: Vec<Record> = sources
        .into_iter()
        .flatten()
        .filter(|r| {
            let keep = r.url.is_empty() || seen.insert(r.url.clone());
            if !keep {
                dropped += 1;
            }
            keep
        })
        .collect();
    if dropped > 0 {
        debug!(dropped, "Dropped records with duplicate URLs");
    }
    merged
}

/// Number of records per platform, in platform order.
pub fn platform_counts(records: &[Record]) -> Vec<(Platform, usize)> {
    records
        .iter()
        .map(|r| r.platform)
        .counts()
        .into_iter()
        .sorted()
        .collect()
}

/// Score `records` in chunks of `batch_size` and send one notification per
/// scored record.
///
/// Every record comes back exactly once, in input order, paired with its
/// verdict. A chunk whose scoring fails only defaults that chunk.
#[instrument(level = "info", skip_all, fields(records = records.len(), batch_size = batch_size))]
pub async fn score_records<A, S>(
    scorer: &BatchScorer<A, S>,
    records: Vec<Record>,
    batch_size: usize,
    max_retries: usize,
    batch_pause: Duration,
    notifier: &SlackNotifier,
) -> Vec<ScoredRecord>
where
    A: AskAsync,
    S: Sleeper,
{
    let batch_size = batch_size.max(1);
    let total_batches = records.len().div_ceil(batch_size);
    let mut scored = Vec::with_capacity(records.len());
    let mut remaining = records.into_iter().peekable();
    let mut batch_no = 0usize;

    while remaining.peek().is_some() {
        batch_no += 1;
        let chunk: Vec<Record> = remaining.by_ref().take(batch_size).collect();
        let texts: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();
        let verdicts = scorer.score_batch(&texts, max_retries).await;

        for (record, verdict) in chunk.into_iter().zip(verdicts) {
            notifier.notify(&record.text, verdict.label, &record.url).await;
            scored.push(ScoredRecord { record, verdict });
        }
        info!(batch = batch_no, total_batches, scored = scored.len(), "Scored batch");

        if remaining.peek().is_some() && !batch_pause.is_zero() {
            tokio::time::sleep(batch_pause).await;
        }
    }

    scored
}

/// Collect, persist the raw table, score and notify, then persist the scored table.
///
/// The raw table is on disk before any scoring starts, so it survives a run
/// that fails later on.
#[instrument(level = "info", skip_all, fields(data_dir = %data_dir.display()))]
pub async fn run<A, S>(
    config: &PipelineConfig,
    sources: &Sources,
    scorer: &BatchScorer<A, S>,
    notifier: &SlackNotifier,
    limits: Limits,
    data_dir: &Path,
) -> Result<Vec<ScoredRecord>, Box<dyn Error>>
where
    A: AskAsync,
    S: Sleeper,
{
    let news_records = sources.news.collect(&config.queries, limits.news).await;
    let reddit_records = sources
        .reddit
        .collect(&config.subreddits, &sources.filter, limits.reddit)
        .await;

    let records = merge_records([news_records, reddit_records]);
    let raw_path = data_dir.join(tables::RAW_FILE_NAME);
    tables::write_raw(&raw_path, &records).await?;

    for (platform, count) in platform_counts(&records) {
        info!(%platform, count, "Collected records per platform");
    }
    info!(count = records.len(), path = %raw_path.display(), "Saved AI-related records");

    let scored = score_records(
        scorer,
        records,
        config.batch_size,
        config.max_retries,
        Duration::from_millis(config.batch_pause_ms),
        notifier,
    )
    .await;

    let scored_path = data_dir.join(tables::SCORED_FILE_NAME);
    tables::write_scored(&scored_path, &scored).await?;
    info!(count = scored.len(), path = %scored_path.display(), "Sentiment analysis completed");
    Ok(scored)
}
