//! LinkedIn profile discovery through the Serper Google search API.

use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::{opt_str, raw_record, text_or_none, AdapterError, SourceAdapter};

const SOURCE_TAG: &str = "serper:linkedin";
const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

pub struct SerperLinkedinAdapter {
    http: Arc<HttpFetcher>,
    api_key: Option<String>,
    queries: Vec<String>,
    results_per_query: usize,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

impl SerperLinkedinAdapter {
    pub fn new(
        http: Arc<HttpFetcher>,
        api_key: Option<String>,
        queries: Vec<String>,
        results_per_query: usize,
    ) -> Self {
        Self {
            http,
            api_key,
            queries,
            results_per_query,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Split a result title shaped like `Name - Title - Company | LinkedIn`.
fn split_profile_title(title: &str) -> (Option<String>, Option<String>, Option<String>) {
    let head = title.split(" | ").next().unwrap_or_default();
    let mut parts = head.split(" - ").map(text_or_none);
    let name = parts.next().flatten();
    let role = parts.next().flatten();
    let company = parts.next().flatten();
    (name, role, company)
}

/// Keep only LinkedIn profile hits and map them into raw talent records.
pub fn parse_results(response: SearchResponse) -> Vec<RawRecord> {
    response
        .organic
        .into_iter()
        .filter(|r| r.link.contains("linkedin.com/in/"))
        .map(|result| {
            let (name, role, company) = split_profile_title(&result.title);
            raw_record([
                ("linkedin_url", JsonValue::from(result.link)),
                ("name", opt_str(name)),
                ("current_title", opt_str(role)),
                ("current_company", opt_str(company)),
                ("snippet", opt_str(text_or_none(&result.snippet))),
            ])
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for SerperLinkedinAdapter {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn category(&self) -> Category {
        Category::Talent
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AdapterError::MissingCredential {
            source_tag: SOURCE_TAG.to_string(),
            var: "SERPER_API_KEY",
        })?;
        let url = format!("{}/search", self.base_url);

        let mut out = Vec::new();
        for query in &self.queries {
            let body = json!({ "q": query, "num": self.results_per_query });
            let response: SearchResponse = self
                .http
                .send_json(SOURCE_TAG, |client| {
                    client.post(&url).header("X-API-KEY", api_key).json(&body)
                })
                .await
                .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))?;
            let records = parse_results(response);
            debug!(query = query.as_str(), profiles = records.len(), "serper search");
            out.extend(records);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_storage::HttpClientConfig;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn profile_title_is_split_into_name_role_company() {
        let response: SearchResponse = serde_json::from_value(json!({
            "organic": [
                {
                    "title": "Jane Doe - Senior Composite Engineer - Airbus | LinkedIn",
                    "link": "https://www.linkedin.com/in/janedoe",
                    "snippet": "Open to work. Composites, CATIA"
                },
                {"title": "Airbus careers", "link": "https://www.airbus.com/careers"}
            ]
        }))
        .unwrap();
        let records = parse_results(response);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "Jane Doe");
        assert_eq!(records[0]["current_title"], "Senior Composite Engineer");
        assert_eq!(records[0]["current_company"], "Airbus");
        assert_eq!(records[0]["snippet"], "Open to work. Composites, CATIA");
    }

    #[test]
    fn short_titles_leave_missing_parts_absent() {
        let (name, role, company) = split_profile_title("John Smith | LinkedIn");
        assert_eq!(name.as_deref(), Some("John Smith"));
        assert!(role.is_none() && company.is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let http = Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap());
        let adapter = SerperLinkedinAdapter::new(http, None, vec!["q".into()], 10);
        assert!(matches!(
            adapter.produce().await,
            Err(AdapterError::MissingCredential { var: "SERPER_API_KEY", .. })
        ));
    }

    #[tokio::test]
    async fn posts_query_with_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "serper-key"))
            .and(body_partial_json(json!({"q": "site:linkedin.com composite engineer", "num": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [{
                    "title": "A B - Engineer - Boeing | LinkedIn",
                    "link": "https://linkedin.com/in/ab"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let http = Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap());
        let adapter = SerperLinkedinAdapter::new(
            http,
            Some("serper-key".into()),
            vec!["site:linkedin.com composite engineer".into()],
            10,
        )
        .with_base_url(server.uri());
        let records = adapter.produce().await.unwrap();
        assert_eq!(records[0]["current_company"], "Boeing");
    }
}
