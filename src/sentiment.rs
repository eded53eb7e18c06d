//! Batch sentiment scoring.
//!
//! A batch of texts is scored with a single model request. The model is asked
//! for a JSON array of `{id, label, score}` objects; the reply is searched for
//! the first array-shaped span, parsed, and mapped back onto the inputs.
//!
//! # Guarantees
//!
//! [`BatchScorer::score_batch`] never fails and always returns exactly one
//! [`Verdict`] per input, in input order:
//! - transport errors and unparseable replies are retried with backoff
//! - once the attempts are exhausted every position gets the neutral fallback
//! - a reply with missing, malformed or too few items is padded per position

use crate::api::{AskAsync, Backoff, LlmError, Sleeper};
use crate::models::{Sentiment, Verdict};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

static JSON_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid JSON array regex"));

const PROMPT_HEADER: &str = "You are a sentiment analysis model. For each text, return a JSON array \
with objects: {\"id\": n, \"label\": \"positive|neutral|negative\", \"score\": -1..1}. \
Respond ONLY with JSON.\n\n";

/// Build the single prompt for a batch, tagging every text with its position.
pub fn build_prompt(texts: &[String]) -> String {
    let mut prompt = String::from(PROMPT_HEADER);
    for (i, text) in texts.iter().enumerate() {
        prompt.push_str(&format!("ID {i}: '''{text}'''\n\n"));
    }
    prompt
}

/// Extract and parse the first `[` … last `]` span of a model reply.
///
/// Models sometimes wrap the array in prose or code fences; anything outside
/// the brackets is ignored. A reply without such a span, or whose span is not
/// a JSON array, is [`LlmError::Malformed`].
pub fn extract_json_array(reply: &str) -> Result<Vec<Value>, LlmError> {
    let span = JSON_ARRAY_RE
        .find(reply)
        .ok_or_else(|| LlmError::Malformed("no JSON array in reply".to_string()))?;
    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(LlmError::Malformed("reply is not a JSON array".to_string())),
        Err(e) => Err(LlmError::Malformed(e.to_string())),
    }
}

fn item_verdict(item: &Value) -> Verdict {
    let label = item
        .get("label")
        .and_then(Value::as_str)
        .and_then(Sentiment::parse)
        .unwrap_or_default();
    let score = match item.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Verdict::new(label, score)
}

/// Map parsed reply items back onto `len` input positions.
///
/// An item goes to the position named by its `id` when that is an in-range,
/// not-yet-filled integer; otherwise to its own array index if that slot is
/// still free. Items that fit nowhere are dropped, and positions nobody
/// filled keep the fallback verdict.
pub fn align_verdicts(items: &[Value], len: usize) -> Vec<Verdict> {
    let mut slots: Vec<Option<Verdict>> = vec![None; len];

    for (index, item) in items.iter().enumerate() {
        let by_id = item
            .get("id")
            .and_then(|id| match id {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            })
            .and_then(|id| usize::try_from(id).ok())
            .filter(|&id| id < len && slots[id].is_none());

        let target = by_id.or_else(|| (index < len && slots[index].is_none()).then_some(index));
        if let Some(target) = target {
            slots[target] = Some(item_verdict(item));
        }
    }

    let missing = slots.iter().filter(|s| s.is_none()).count();
    if missing > 0 {
        warn!(missing, expected = len, "Model reply short; padding with neutral verdicts");
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(Verdict::fallback))
        .collect()
}

/// Scores batches of texts through an [`AskAsync`] model with bounded retry.
#[derive(Debug)]
pub struct BatchScorer<A, S> {
    model: A,
    sleeper: S,
    backoff: Backoff,
}

impl<A, S> BatchScorer<A, S>
where
    A: AskAsync,
    S: Sleeper,
{
    pub fn new(model: A, sleeper: S, backoff: Backoff) -> Self {
        Self {
            model,
            sleeper,
            backoff,
        }
    }

    /// One verdict per text, in input order. Never fails.
    ///
    /// Makes at most `max_retries` model calls, sleeping on the backoff
    /// schedule between consecutive failures. With `max_retries == 0` the
    /// model is not called and the fallback is returned directly.
    #[instrument(level = "info", skip_all, fields(batch_len = texts.len(), max_retries = max_retries))]
    pub async fn score_batch(&self, texts: &[String], max_retries: usize) -> Vec<Verdict> {
        if texts.is_empty() {
            return Vec::new();
        }

        let prompt = build_prompt(texts);
        let total_t0 = Instant::now();
        let mut failures = 0usize;

        while failures < max_retries {
            let outcome = match self.model.ask(&prompt).await {
                Ok(reply) => extract_json_array(&reply).map_err(|e| {
                    debug!(reply = %truncate_for_log(&reply, 300), "Unusable model reply");
                    e
                }),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(items) => {
                    info!(
                        items = items.len(),
                        attempts = failures + 1,
                        elapsed_ms = total_t0.elapsed().as_millis(),
                        "Batch scored"
                    );
                    return align_verdicts(&items, texts.len());
                }
                Err(e) => {
                    failures += 1;
                    if failures >= max_retries {
                        warn!(attempt = failures, max = max_retries, error = %e, "Sentiment batch failed");
                        break;
                    }
                    let delay = self.backoff.delay_for(failures);
                    warn!(
                        attempt = failures,
                        max = max_retries,
                        ?delay,
                        error = %e,
                        "Sentiment batch failed; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        warn!(
            batch_len = texts.len(),
            elapsed_ms = total_t0.elapsed().as_millis(),
            "Returning neutral sentiments for batch due to repeated failure"
        );
        vec![Verdict::fallback(); texts.len()]
    }
}
