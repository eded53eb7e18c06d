//! Best-effort Slack notifications.
//!
//! One message per scored record is posted to a Slack incoming webhook. The
//! notifier never reports failure to its caller: transport errors and non-2xx
//! replies are logged and dropped. Without a webhook URL every call is a
//! silent no-op.

use crate::models::Sentiment;
use crate::utils::upcase;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Posts sentiment alerts to an optional Slack webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    /// A notifier for `webhook_url`; `None` (or a blank URL) disables delivery.
    pub fn new(webhook_url: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for Slack");
                Client::new()
            });
        Self {
            http,
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Send one alert. Never fails.
    #[instrument(level = "debug", skip_all, fields(label = %label, url = %url))]
    pub async fn notify(&self, title: &str, label: Sentiment, url: &str) {
        let Some(webhook) = self.webhook_url.as_deref() else {
            return;
        };

        match self.http.post(webhook).json(&alert_payload(title, label, url)).send().await {
            Ok(resp) if resp.status().is_success() => debug!("Slack alert sent"),
            Ok(resp) => warn!(status = resp.status().as_u16(), "Slack webhook rejected alert"),
            Err(e) => warn!(error = %e, "Slack alert error"),
        }
    }
}

fn emoji_for(label: Sentiment) -> &'static str {
    match label {
        Sentiment::Positive => "✅",
        Sentiment::Neutral => "⚪",
        Sentiment::Negative => "⚠️",
    }
}

/// Slack Block Kit body for one alert.
pub fn alert_payload(title: &str, label: Sentiment, url: &str) -> Value {
    let text = format!(
        "{} *Sentiment Alert*\n*Title:* {}\n*Sentiment:* {}\n< {} | Read Post >",
        emoji_for(label),
        title,
        upcase(label.as_str()),
        url
    );
    json!({
        "blocks": [
            {
                "type": "section",
                "text": {"type": "mrkdwn", "text": text}
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_payload_shape() {
        let payload = alert_payload("GPUs sold out", Sentiment::Positive, "https://x.test/1");
        let text = payload["blocks"][0]["text"]["text"].as_str().unwrap();
        assert_eq!(payload["blocks"][0]["type"], "section");
        assert_eq!(payload["blocks"][0]["text"]["type"], "mrkdwn");
        assert!(text.starts_with("✅ *Sentiment Alert*"));
        assert!(text.contains("*Title:* GPUs sold out"));
        assert!(text.contains("*Sentiment:* Positive"));
        assert!(text.ends_with("< https://x.test/1 | Read Post >"));
    }

    #[test]
    fn test_emoji_per_label() {
        let neutral = alert_payload("t", Sentiment::Neutral, "u");
        assert!(neutral["blocks"][0]["text"]["text"].as_str().unwrap().starts_with("⚪"));
        let negative = alert_payload("t", Sentiment::Negative, "u");
        assert!(negative["blocks"][0]["text"]["text"].as_str().unwrap().starts_with("⚠️"));
    }

    #[tokio::test]
    async fn test_disabled_without_url() {
        let notifier = SlackNotifier::new(None);
        assert!(!notifier.is_enabled());
        notifier.notify("t", Sentiment::Neutral, "u").await;

        assert!(!SlackNotifier::new(Some("  ".into())).is_enabled());
    }

    #[tokio::test]
    async fn test_posts_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_string_contains("Sentiment Alert"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(Some(format!("{}/hook", server.uri())));
        notifier.notify("title", Sentiment::Negative, "https://x").await;
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(Some(server.uri()));
        notifier.notify("title", Sentiment::Positive, "https://x").await;

        let unreachable = SlackNotifier::new(Some("http://127.0.0.1:1/hook".into()));
        unreachable.notify("title", Sentiment::Positive, "https://x").await;
    }
}
