//! NewsAPI article collector.
//!
//! Searches [NewsAPI](https://newsapi.org/docs/endpoints/everything) once per
//! configured query over a trailing window (30 days by default), English only,
//! newest first. Each query is read for a fixed number of pages; a fixed
//! delay follows every request to stay inside the free-tier rate limit.

use crate::config::PipelineConfig;
use crate::models::{Platform, Record};
use crate::utils::{clean_text, parse_timestamp};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

impl NewsApiArticle {
    fn into_record(self, query: &str) -> Record {
        let raw = format!(
            "{} {}",
            self.title.unwrap_or_default(),
            self.content.unwrap_or_default()
        );
        Record {
            platform: Platform::News,
            timestamp: self.published_at.as_deref().and_then(parse_timestamp),
            query: query.to_string(),
            text: clean_text(&raw),
            url: self.url.unwrap_or_default(),
        }
    }
}

/// Paginated NewsAPI search client.
pub struct NewsCollector {
    http: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
    pages_per_query: u32,
    lookback_days: i64,
    request_delay: Duration,
}

impl std::fmt::Debug for NewsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsCollector")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("pages_per_query", &self.pages_per_query)
            .finish_non_exhaustive()
    }
}

impl NewsCollector {
    pub fn new(api_key: String, config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("ai_market_sentiment/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: config.endpoints.news_api.trim_end_matches('/').to_string(),
            page_size: config.news_page_size,
            pages_per_query: config.news_pages_per_query,
            lookback_days: config.news_lookback_days,
            request_delay: Duration::from_millis(config.news_request_delay_ms),
        })
    }

    /// Collect up to `total_records` articles, query by query, page by page.
    ///
    /// Articles keep the query that found them in [`Record::query`]; no
    /// relevance filtering happens on this path.
    #[instrument(level = "info", skip_all, fields(queries = queries.len(), total_records = total_records))]
    pub async fn collect(&self, queries: &[String], total_records: usize) -> Vec<Record> {
        let now = Utc::now();
        let from = (now - ChronoDuration::days(self.lookback_days))
            .format("%Y-%m-%d")
            .to_string();
        let to = now.format("%Y-%m-%d").to_string();

        let mut records = Vec::new();
        'queries: for query in queries {
            if records.len() >= total_records {
                break;
            }
            for page in 1..=self.pages_per_query {
                match self.fetch_page(query, page, &from, &to).await {
                    Ok(articles) => {
                        debug!(%query, page, count = articles.len(), "Fetched NewsAPI page");
                        for article in articles {
                            if records.len() >= total_records {
                                break;
                            }
                            records.push(article.into_record(query));
                        }
                    }
                    Err(e) => warn!(%query, page, error = %e, "NewsAPI request failed; skipping page"),
                }
                tokio::time::sleep(self.request_delay).await;
                if records.len() >= total_records {
                    break 'queries;
                }
            }
        }

        info!(count = records.len(), "Collected NewsAPI articles");
        records
    }

    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        from: &str,
        to: &str,
    ) -> Result<Vec<NewsApiArticle>, Box<dyn Error>> {
        let url = format!("{}/v2/everything", self.base_url);
        let page = page.to_string();
        let page_size = self.page_size.to_string();
        let resp = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("language", "en"),
                ("from", from),
                ("to", to),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("page", page.as_str()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("NewsAPI returned {status}").into());
        }
        let body: EverythingResponse = resp.json().await.map_err(reqwest::Error::without_url)?;
        Ok(body.articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collector(server: &MockServer) -> NewsCollector {
        let mut config = PipelineConfig::default();
        config.endpoints.news_api = server.uri();
        config.news_request_delay_ms = 0;
        NewsCollector::new("news-key".to_string(), &config).unwrap()
    }

    fn article(i: usize) -> serde_json::Value {
        json!({
            "title": format!("Headline {i}"),
            "content": format!("Body {i}\nmore at https://example.com/{i}"),
            "url": format!("https://news.example/{i}"),
            "publishedAt": "2025-10-01T12:00:00Z"
        })
    }

    async fn mount_page(server: &MockServer, q: &str, page: &str, articles: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", q))
            .and(query_param("page", page))
            .and(header("x-api-key", "news-key"))
            .and(query_param("language", "en"))
            .and(query_param("sortBy", "publishedAt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": articles.len(),
                "articles": articles
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_collects_and_normalizes_articles() {
        let server = MockServer::start().await;
        mount_page(&server, "machine learning", "1", vec![article(0), article(1)]).await;
        mount_page(&server, "machine learning", "2", vec![]).await;

        let records = collector(&server)
            .collect(&["machine learning".to_string()], 50)
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].platform, Platform::News);
        assert_eq!(records[0].query, "machine learning");
        assert_eq!(records[0].text, "Headline 0 Body 0 more at");
        assert_eq!(records[0].url, "https://news.example/0");
        assert!(records[0].timestamp.is_some());
    }

    #[tokio::test]
    async fn test_stops_at_total_records() {
        let server = MockServer::start().await;
        mount_page(&server, "deep learning", "1", (0..5).map(article).collect()).await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", "AI startups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"articles": [article(9)]})))
            .expect(0)
            .mount(&server)
            .await;

        let queries = vec!["deep learning".to_string(), "AI startups".to_string()];
        let records = collector(&server).collect(&queries, 3).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.query == "deep learning"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        let mut config = PipelineConfig::default();
        config.endpoints.news_api = "http://127.0.0.1:1".to_string();
        let collector = NewsCollector::new("SECRET-NEWS-KEY".to_string(), &config).unwrap();

        let err = collector
            .fetch_page("machine learning", 1, "2025-01-01", "2025-01-31")
            .await
            .unwrap_err();
        let shown = format!("{err} {err:?}");
        assert!(!shown.contains("SECRET-NEWS-KEY"), "{shown}");
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(426))
            .mount(&server)
            .await;
        mount_page(&server, "generative AI", "2", vec![article(7)]).await;

        let records = collector(&server)
            .collect(&["generative AI".to_string()], 10)
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://news.example/7");
    }

    #[tokio::test]
    async fn test_null_fields_and_bad_dates() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "artificial intelligence",
            "1",
            vec![json!({"title": null, "content": "Only body", "url": null, "publishedAt": "soon"})],
        )
        .await;
        mount_page(&server, "artificial intelligence", "2", vec![]).await;

        let records = collector(&server)
            .collect(&["artificial intelligence".to_string()], 10)
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "Only body");
        assert_eq!(records[0].url, "");
        assert!(records[0].timestamp.is_none());
    }
}
