//! Flat CSV tables for collected and scored records.
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── raw_ai_market_data.csv        # platform,timestamp,query,text,url
//! └── analyzed_ai_market_data.csv   # platform,timestamp,query,text,label,score,url
//! ```
//!
//! Both files are UTF-8 with a header row and are replaced on every run, so
//! the row count always equals the latest run's record count. Unknown
//! timestamps are written as empty cells.

use crate::models::{Record, ScoredRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const RAW_FILE_NAME: &str = "raw_ai_market_data.csv";
pub const SCORED_FILE_NAME: &str = "analyzed_ai_market_data.csv";

const RAW_HEADER: [&str; 5] = ["platform", "timestamp", "query", "text", "url"];
const SCORED_HEADER: [&str; 7] = ["platform", "timestamp", "query", "text", "label", "score", "url"];

/// One row of the annotated table, as read back by the chart renderer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoredRow {
    pub platform: String,
    pub timestamp: String,
    pub query: String,
    pub text: String,
    pub label: String,
    pub score: f64,
    pub url: String,
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Serialize records into the raw table layout.
pub fn raw_csv(records: &[Record]) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RAW_HEADER)?;
    for r in records {
        writer.write_record([
            r.platform.to_string(),
            format_timestamp(r.timestamp),
            r.query.clone(),
            r.text.clone(),
            r.url.clone(),
        ])?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Serialize scored records into the annotated table layout.
pub fn scored_csv(records: &[ScoredRecord]) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SCORED_HEADER)?;
    for s in records {
        let r = &s.record;
        writer.write_record([
            r.platform.to_string(),
            format_timestamp(r.timestamp),
            r.query.clone(),
            r.text.clone(),
            s.verdict.label.to_string(),
            s.verdict.score.to_string(),
            r.url.clone(),
        ])?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Write (replacing) the raw table at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = records.len()))]
pub async fn write_raw(path: &Path, records: &[Record]) -> Result<(), Box<dyn Error>> {
    let bytes = raw_csv(records)?;
    fs::write(path, bytes).await?;
    info!("Wrote raw records table");
    Ok(())
}

/// Write (replacing) the annotated table at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = records.len()))]
pub async fn write_scored(path: &Path, records: &[ScoredRecord]) -> Result<(), Box<dyn Error>> {
    let bytes = scored_csv(records)?;
    fs::write(path, bytes).await?;
    info!("Wrote scored records table");
    Ok(())
}

/// Read the annotated table back.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_scored(path: &Path) -> Result<Vec<ScoredRow>, Box<dyn Error>> {
    let bytes = fs::read(path).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let rows = reader
        .deserialize::<ScoredRow>()
        .collect::<Result<Vec<_>, _>>()?;
    info!(rows = rows.len(), "Read scored records table");
    Ok(rows)
}
