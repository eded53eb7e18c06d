//! Data models for collected records and their sentiment verdicts.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Platform`]: Which source a record came from
//! - [`Record`]: One collected, normalized piece of text with provenance
//! - [`Sentiment`] / [`Verdict`]: The label and score assigned by the model
//! - [`ScoredRecord`]: A record paired with its verdict
//!
//! Scoring consumes [`Record`]s and produces [`ScoredRecord`]s, so a verdict can
//! only ever exist on a record that went through the scorer.

use chrono::{DateTime, Utc};
use std::fmt;

/// The source a record was collected from.
///
/// The display names (`newsapi`, `reddit`) are what ends up in the CSV
/// `platform` column and on the chart legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// News articles from the NewsAPI search endpoint.
    News,
    /// Posts from Reddit subreddit listings.
    Discussion,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::News => "newsapi",
            Platform::Discussion => "reddit",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of collected text with provenance metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Where the text came from.
    pub platform: Platform,
    /// Publication/creation time; `None` when the source gave nothing parseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Topic phrase that matched, or the search query that produced the record.
    pub query: String,
    /// Normalized title and body (see [`crate::utils::clean_text`]).
    pub text: String,
    /// Link back to the original article or post.
    pub url: String,
}

/// Sentiment label returned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Every label, in the order they are charted.
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Lenient, case-insensitive parse used on model output.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sentiment label with a score in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Verdict {
    pub label: Sentiment,
    pub score: f64,
}

impl Verdict {
    /// Build a verdict, clamping the score into `[-1, 1]`. NaN becomes `0`.
    pub fn new(label: Sentiment, score: f64) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(-1.0, 1.0) };
        Self { label, score }
    }

    /// The neutral/zero verdict substituted when scoring cannot complete.
    pub fn fallback() -> Self {
        Self {
            label: Sentiment::Neutral,
            score: 0.0,
        }
    }
}

/// A [`Record`] annotated with the scorer's [`Verdict`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: Record,
    pub verdict: Verdict,
}
