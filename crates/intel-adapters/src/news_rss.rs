//! Google News RSS search feeds, one per configured topic.

use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use scraper::Html;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::{opt_str, raw_record, text_or_none, AdapterError, SourceAdapter};

const SOURCE_TAG: &str = "google_news";
const DEFAULT_BASE_URL: &str = "https://news.google.com";

pub struct GoogleNewsRssAdapter {
    http: Arc<HttpFetcher>,
    topics: Vec<String>,
    results_per_topic: usize,
    base_url: String,
}

impl GoogleNewsRssAdapter {
    pub fn new(http: Arc<HttpFetcher>, topics: Vec<String>, results_per_topic: usize) -> Self {
        Self {
            http,
            topics,
            results_per_topic,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Google News titles read `Headline - Publisher`.
fn split_title(title: &str) -> (Option<String>, Option<String>) {
    match title.rsplit_once(" - ") {
        Some((headline, source)) => (text_or_none(headline), text_or_none(source)),
        None => (text_or_none(title), None),
    }
}

fn strip_markup(fragment: &str) -> Option<String> {
    let text = Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    text_or_none(&text).map(|t| t.chars().take(500).collect())
}

pub fn parse_feed(bytes: &[u8], topic: &str, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|err| AdapterError::parse(SOURCE_TAG, err.to_string()))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let (headline, source) = split_title(&title);
            let published = entry.published.or(entry.updated).map(|dt| dt.to_rfc3339());
            Some(raw_record([
                ("url", JsonValue::from(url)),
                ("headline", opt_str(headline)),
                ("source", opt_str(source)),
                ("summary", opt_str(entry.summary.and_then(|s| strip_markup(&s.content)))),
                ("published_at", opt_str(published)),
                ("search_topic", JsonValue::from(topic)),
            ]))
        })
        .take(limit)
        .collect())
}

#[async_trait]
impl SourceAdapter for GoogleNewsRssAdapter {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn category(&self) -> Category {
        Category::News
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let url = format!("{}/rss/search", self.base_url);
        let mut out = Vec::new();
        for topic in &self.topics {
            let resp = self
                .http
                .send(SOURCE_TAG, |client| {
                    client.get(&url).query(&[
                        ("q", topic.as_str()),
                        ("hl", "en-US"),
                        ("gl", "US"),
                        ("ceid", "US:en"),
                    ])
                })
                .await
                .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))?;
            let records = parse_feed(&resp.body, topic, self.results_per_topic)?;
            debug!(topic = topic.as_str(), articles = records.len(), "news feed");
            out.extend(records);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_storage::HttpClientConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>"JetZero" - Google News</title>
  <item>
    <title>JetZero raises $500M Series B - Reuters</title>
    <link>https://news.example.com/jetzero-series-b</link>
    <pubDate>Tue, 14 Oct 2025 12:00:00 GMT</pubDate>
    <description>&lt;a href="x"&gt;JetZero raises&lt;/a&gt; funding for blended wing</description>
  </item>
  <item>
    <title>Blended wing outlook</title>
    <link>https://news.example.com/bwb</link>
  </item>
</channel></rss>"#;

    #[test]
    fn rss_items_become_news_records() {
        let records = parse_feed(RSS.as_bytes(), "JetZero", 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["headline"], "JetZero raises $500M Series B");
        assert_eq!(records[0]["source"], "Reuters");
        assert_eq!(records[0]["summary"], "JetZero raises funding for blended wing");
        assert!(records[0]["published_at"].as_str().unwrap().starts_with("2025-10-14T12:00:00"));
        assert!(records[1].get("source").is_none());
        assert_eq!(records[1]["search_topic"], "JetZero");
    }

    #[test]
    fn limit_and_garbage() {
        assert_eq!(parse_feed(RSS.as_bytes(), "t", 1).unwrap().len(), 1);
        assert!(matches!(parse_feed(b"not xml", "t", 5), Err(AdapterError::Parse { .. })));
    }

    #[tokio::test]
    async fn fetches_one_feed_per_topic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss/search"))
            .and(query_param("q", "JetZero"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .expect(1)
            .mount(&server)
            .await;
        let http = Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap());
        let adapter =
            GoogleNewsRssAdapter::new(http, vec!["JetZero".into()], 5).with_base_url(server.uri());
        assert_eq!(adapter.produce().await.unwrap().len(), 2);
    }
}
