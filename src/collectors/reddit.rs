//! Reddit discussion collector.
//!
//! Authenticates as a script application (client-credentials grant), then
//! walks each configured subreddit's `new` listing, keeping only posts whose
//! title and body match the [`RelevanceFilter`]. The matched phrase becomes the
//! record's `query`.
//!
//! # Limits
//!
//! Per subreddit, at most `total_records * 5` posts are scanned, 100 per
//! listing page, following the `after` cursor. Collection stops as soon as
//! `total_records` relevant posts have been gathered across all subreddits.

use crate::config::PipelineConfig;
use crate::models::{Platform, Record};
use crate::relevance::RelevanceFilter;
use crate::utils::{clean_text, from_unix_seconds};
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const MAX_PAGE_SIZE: usize = 100;
const SCAN_MULTIPLIER: usize = 5;

/// Reddit application credentials.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    permalink: String,
}

/// OAuth client for subreddit listings.
#[derive(Debug)]
pub struct RedditCollector {
    http: Client,
    credentials: RedditCredentials,
    auth_base: String,
    api_base: String,
}

impl RedditCollector {
    pub fn new(credentials: RedditCredentials, config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(credentials.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            credentials,
            auth_base: config.endpoints.reddit_auth.trim_end_matches('/').to_string(),
            api_base: config.endpoints.reddit_api.trim_end_matches('/').to_string(),
        })
    }

    /// Collect up to `total_records` relevant posts across `subreddits`, in order.
    ///
    /// An authentication failure skips the whole source; a failing subreddit
    /// is skipped on its own, keeping whatever it yielded before the error.
    #[instrument(level = "info", skip_all, fields(subreddits = subreddits.len(), total_records = total_records))]
    pub async fn collect(
        &self,
        subreddits: &[String],
        filter: &RelevanceFilter,
        total_records: usize,
    ) -> Vec<Record> {
        let mut records = Vec::new();
        if total_records == 0 {
            return records;
        }

        let token = match self.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Reddit authentication failed; skipping discussion source");
                return records;
            }
        };

        for sub in subreddits {
            let before = records.len();
            if let Err(e) = self
                .scan_subreddit(&token, sub, filter, total_records, &mut records)
                .await
            {
                warn!(subreddit = %sub, error = %e, "Skipping subreddit due to error");
            }
            debug!(subreddit = %sub, kept = records.len() - before, "Scanned subreddit");
            if records.len() >= total_records {
                break;
            }
        }

        info!(count = records.len(), "Collected Reddit posts");
        records
    }

    async fn access_token(&self) -> Result<String, Box<dyn Error>> {
        let url = format!("{}/api/v1/access_token", self.auth_base);
        let resp = self
            .http
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("token endpoint returned {status}").into());
        }
        let token: TokenResponse = resp.json().await?;
        Ok(token.access_token)
    }

    async fn scan_subreddit(
        &self,
        token: &str,
        sub: &str,
        filter: &RelevanceFilter,
        total_records: usize,
        records: &mut Vec<Record>,
    ) -> Result<(), Box<dyn Error>> {
        let scan_cap = total_records.saturating_mul(SCAN_MULTIPLIER);
        let mut scanned = 0usize;
        let mut after: Option<String> = None;

        while scanned < scan_cap {
            let limit = (scan_cap - scanned).min(MAX_PAGE_SIZE);
            let listing = self.fetch_new(token, sub, limit, after.as_deref()).await?;
            if listing.children.is_empty() {
                break;
            }

            for child in listing.children.into_iter().take(limit) {
                scanned += 1;
                let post = child.data;
                let text = clean_text(&format!("{} {}", post.title, post.selftext));
                let Some(phrase) = filter.is_relevant(&text) else {
                    continue;
                };
                records.push(Record {
                    platform: Platform::Discussion,
                    timestamp: post.created_utc.and_then(from_unix_seconds),
                    query: phrase.to_string(),
                    text,
                    url: format!("https://reddit.com{}", post.permalink),
                });
                if records.len() >= total_records {
                    return Ok(());
                }
            }

            after = listing.after;
            if after.is_none() {
                break;
            }
        }
        Ok(())
    }

    async fn fetch_new(
        &self,
        token: &str,
        sub: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<ListingData, Box<dyn Error>> {
        let url = format!("{}/r/{}/new", self.api_base, urlencoding::encode(sub));
        let mut query = vec![
            ("limit", limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("r/{sub} returned {status}").into());
        }
        let listing: Listing = resp.json().await?;
        Ok(listing.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_topic_phrases;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collector(server: &MockServer) -> RedditCollector {
        let mut config = PipelineConfig::default();
        config.endpoints.reddit_auth = server.uri();
        config.endpoints.reddit_api = server.uri();
        RedditCollector::new(
            RedditCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                user_agent: "ai-sentiment-bot".into(),
            },
            &config,
        )
        .unwrap()
    }

    fn filter() -> RelevanceFilter {
        RelevanceFilter::new(default_topic_phrases()).unwrap()
    }

    fn post(title: &str, body: &str, id: &str) -> serde_json::Value {
        json!({
            "kind": "t3",
            "data": {
                "title": title,
                "selftext": body,
                "created_utc": 1_700_000_000.0,
                "permalink": format!("/r/test/comments/{id}/")
            }
        })
    }

    fn listing(children: Vec<serde_json::Value>, after: Option<&str>) -> serde_json::Value {
        json!({"kind": "Listing", "data": {"after": after, "children": children}})
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 86400
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_filters_and_follows_pagination() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/MachineLearning/new"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param_is_missing("after"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![
                    post("New Machine Learning paper", "details\nhere", "a"),
                    post("My sourdough recipe", "", "b"),
                ],
                Some("t3_b"),
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/MachineLearning/new"))
            .and(query_param("after", "t3_b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![post("Thoughts", "is deep learning overhyped?", "c")],
                None,
            )))
            .mount(&server)
            .await;

        let records = collector(&server)
            .collect(&["MachineLearning".to_string()], &filter(), 10)
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].platform, Platform::Discussion);
        assert_eq!(records[0].query, "machine learning");
        assert_eq!(records[0].text, "New Machine Learning paper details here");
        assert_eq!(records[0].url, "https://reddit.com/r/test/comments/a/");
        assert_eq!(records[0].timestamp.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(records[1].query, "deep learning");
    }

    #[tokio::test]
    async fn test_failing_subreddit_is_skipped() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/private_sub/new"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/OpenAI/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                vec![post("Generative AI everywhere", "", "z")],
                None,
            )))
            .mount(&server)
            .await;

        let subs = vec!["private_sub".to_string(), "OpenAI".to_string()];
        let records = collector(&server).collect(&subs, &filter(), 10).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "generative AI");
    }

    #[tokio::test]
    async fn test_stops_at_total_records() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/datascience/new"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(
                (0..4)
                    .map(|i| post("machine learning", "", &i.to_string()))
                    .collect(),
                Some("t3_next"),
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/OpenAI/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![], None)))
            .expect(0)
            .mount(&server)
            .await;

        let subs = vec!["datascience".to_string(), "OpenAI".to_string()];
        let records = collector(&server).collect(&subs, &filter(), 2).await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_skips_source() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let records = collector(&server)
            .collect(&["MachineLearning".to_string()], &filter(), 10)
            .await;
        assert!(records.is_empty());
    }
}
