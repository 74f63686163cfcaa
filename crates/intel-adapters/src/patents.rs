//! Google Patents search result pages.

use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use scraper::Html;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::html::{first_attr, first_text, selector};
use crate::{opt_str, raw_record, AdapterError, SourceAdapter};

const SOURCE_TAG: &str = "google_patents";
const DEFAULT_BASE_URL: &str = "https://patents.google.com";

pub struct GooglePatentsAdapter {
    http: Arc<HttpFetcher>,
    queries: Vec<String>,
    max_results: usize,
    base_url: String,
}

impl GooglePatentsAdapter {
    pub fn new(http: Arc<HttpFetcher>, queries: Vec<String>, max_results: usize) -> Self {
        Self {
            http,
            queries,
            max_results,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

pub fn parse_results(
    html: &str,
    query: &str,
    max_results: usize,
    base_url: &str,
) -> Result<Vec<RawRecord>, AdapterError> {
    let document = Html::parse_document(html);
    let items = selector(SOURCE_TAG, "search-result-item")?;
    let number_sel = selector(SOURCE_TAG, "span[itemprop='publicationNumber']")?;
    let title_sel = selector(SOURCE_TAG, "span[itemprop='title']")?;
    let assignee_sel = selector(SOURCE_TAG, "span[itemprop='assigneeOriginal']")?;
    let date_sel = selector(SOURCE_TAG, "time[itemprop='publicationDate']")?;

    let mut out = Vec::new();
    for item in document.select(&items).take(max_results) {
        let Some(number) = first_text(item, &number_sel) else {
            continue;
        };
        let title = first_text(item, &title_sel).map(|t| t.chars().take(500).collect::<String>());
        out.push(raw_record([
            ("url", JsonValue::from(format!("{base_url}/patent/{number}"))),
            ("patent_number", JsonValue::from(number)),
            ("title", opt_str(title)),
            ("assignee", opt_str(first_text(item, &assignee_sel))),
            ("publication_date", opt_str(first_attr(item, &date_sel, "datetime"))),
            ("search_query", JsonValue::from(query)),
        ]));
    }
    Ok(out)
}

#[async_trait]
impl SourceAdapter for GooglePatentsAdapter {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn category(&self) -> Category {
        Category::Patent
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let mut out = Vec::new();
        for query in &self.queries {
            let url = format!("{}/", self.base_url);
            let resp = self
                .http
                .send(SOURCE_TAG, |client| {
                    client.get(&url).query(&[("q", query.as_str()), ("oq", query.as_str())])
                })
                .await
                .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))?;
            let html = String::from_utf8_lossy(&resp.body);
            let records = parse_results(&html, query, self.max_results, &self.base_url)?;
            debug!(query = query.as_str(), patents = records.len(), "patent search");
            out.extend(records);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <search-result-item>
          <span itemprop="publicationNumber">US11787533B2</span>
          <span itemprop="title">Blended wing body aircraft with cargo bay</span>
          <span itemprop="assigneeOriginal">JetZero, Inc.</span>
          <time itemprop="publicationDate" datetime="2025-10-14">Oct 14, 2025</time>
        </search-result-item>
        <search-result-item>
          <span itemprop="title">No number here</span>
        </search-result-item>
        <search-result-item>
          <span itemprop="publicationNumber">EP4100001A1</span>
        </search-result-item>"#;

    #[test]
    fn result_items_without_numbers_are_skipped() {
        let records = parse_results(PAGE, "blended wing body", 10, DEFAULT_BASE_URL).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["patent_number"], "US11787533B2");
        assert_eq!(records[0]["assignee"], "JetZero, Inc.");
        assert_eq!(records[0]["publication_date"], "2025-10-14");
        assert_eq!(records[0]["url"], "https://patents.google.com/patent/US11787533B2");
        assert!(records[1].get("title").is_none());
    }

    #[test]
    fn max_results_limits_items_scanned() {
        let records = parse_results(PAGE, "q", 1, DEFAULT_BASE_URL).unwrap();
        assert_eq!(records.len(), 1);
    }
}
