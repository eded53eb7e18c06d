//! LLM API interaction and retry timing.
//!
//! This module provides the seam between the sentiment scorer and the external
//! model:
//! - [`AskAsync`]: Core trait defining async prompt → text interaction
//! - [`GeminiClient`]: [`AskAsync`] over the Google Gemini `generateContent` REST API
//! - [`Sleeper`] / [`TokioSleeper`]: Injectable wait used between retries
//! - [`Backoff`]: Exponential retry delay schedule
//!
//! # Retry Strategy
//!
//! - Delay starts at the configured base (5 seconds by default)
//! - Multiplied by 1.5 after every failed attempt
//! - Capped at the configured maximum (60 seconds by default)
//! - No jitter: runs are sequential, so there is no herd to spread out

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Failures talking to the model. All of them are treated as transient by the scorer.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("model returned no content")]
    EmptyResponse,

    #[error("malformed model output: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LlmError {
    /// The request URL is dropped so endpoint credentials never reach the logs.
    fn from(e: reqwest::Error) -> Self {
        LlmError::Network(e.without_url())
    }
}

/// Trait for async LLM interaction.
///
/// Implementors send a free-text prompt to a model and return its free-text
/// answer. The scorer only depends on this trait, so tests substitute a
/// scripted fake for the network client.
pub trait AskAsync {
    /// Send `prompt` to the model and return the text of its reply.
    async fn ask(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Something that can wait. Production code sleeps on the tokio timer; tests
/// record the requested delays and return immediately.
pub trait Sleeper {
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Exponential backoff schedule without jitter.
///
/// ```text
/// delay(n) = min(base_delay * 1.5^(n-1), max_delay)   for the n-th failure
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Backoff {
    pub const FACTOR: f64 = 1.5;

    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            factor: Self::FACTOR,
        }
    }

    /// Delay to wait after the `failures`-th consecutive failure (1-based).
    pub fn delay_for(&self, failures: usize) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as usize) as i32;
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let max_secs = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= max_secs {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

/// Google Gemini API client.
///
/// Configured once at startup and handed to the scorer; holds no mutable state.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiClient {
    /// Create a client for `model` (e.g. `gemini-2.5-flash-lite`) against `base_url`.
    pub fn new(api_key: String, model: String, base_url: &str) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

impl AskAsync for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let t0 = Instant::now();
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis(),
                status = status.as_u16(),
                "Gemini call failed"
            );
            return Err(match status.as_u16() {
                429 => LlmError::RateLimit,
                code => LlmError::Api { status: code, body },
            });
        }

        let parsed: GeminiResponse = resp.json().await?;
        debug!(elapsed_ms = t0.elapsed().as_millis(), "Gemini call completed");

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(LlmError::Blocked("SAFETY".to_string()));
        }

        candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash-lite:generateContent";

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            "test-key".to_string(),
            "models/gemini-2.5-flash-lite".to_string(),
            &server.uri(),
        )
        .unwrap()
    }

    #[test]
    fn test_backoff_grows_by_half() {
        let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(5));
        assert_eq!(backoff.delay_for(2), Duration::from_secs_f64(7.5));
        assert_eq!(backoff.delay_for(3), Duration::from_secs_f64(11.25));
    }

    #[test]
    fn test_backoff_is_capped() {
        let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(backoff.delay_for(10), Duration::from_secs(60));
        assert_eq!(backoff.delay_for(usize::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_model_prefix_stripped() {
        let client = GeminiClient::new("k".into(), "models/gemini-x".into(), "http://h/").unwrap();
        assert_eq!(client.model_name(), "gemini-x");
    }

    #[tokio::test]
    async fn test_ask_returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "[{\"id\":0,\"label\":\"positive\",\"score\":0.8}]"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).ask("score this").await.unwrap();
        assert!(text.contains("positive"));
    }

    #[tokio::test]
    async fn test_network_error_hides_api_key() {
        let client = GeminiClient::new(
            "SECRET-GEMINI-KEY".to_string(),
            "gemini-x".to_string(),
            "http://127.0.0.1:1",
        )
        .unwrap();

        let err = client.ask("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_)));
        let shown = format!("{err} {err:?}");
        assert!(!shown.contains("SECRET-GEMINI-KEY"), "{shown}");
    }

    #[tokio::test]
    async fn test_ask_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).ask("x").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimit));
    }

    #[tokio::test]
    async fn test_ask_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        match client_for(&server).ask("x").await.unwrap_err() {
            LlmError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ask_safety_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).ask("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Blocked(_)));
    }

    #[tokio::test]
    async fn test_ask_no_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).ask("x").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
