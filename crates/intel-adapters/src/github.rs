//! GitHub user search: one search request per query, then a detail request per user.

use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::{opt_str, raw_record, text_or_none, AdapterError, SourceAdapter};

const SOURCE_TAG: &str = "github";
const DEFAULT_BASE_URL: &str = "https://api.github.com";

pub struct GithubSearchAdapter {
    http: Arc<HttpFetcher>,
    token: Option<String>,
    queries: Vec<String>,
    per_page: u8,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub login: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserDetails {
    pub login: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub hireable: Option<bool>,
    pub html_url: Option<String>,
}

impl GithubSearchAdapter {
    pub fn new(
        http: Arc<HttpFetcher>,
        token: Option<String>,
        queries: Vec<String>,
        per_page: u8,
    ) -> Self {
        Self {
            http,
            token,
            queries,
            per_page: per_page.max(1),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, client: &reqwest::Client, url: &str) -> reqwest::RequestBuilder {
        let builder = client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn search(&self, query: &str) -> Result<SearchPage, AdapterError> {
        let url = format!("{}/search/users", self.base_url);
        let per_page = self.per_page.to_string();
        self.http
            .send_json(SOURCE_TAG, |client| {
                self.request(client, &url)
                    .query(&[("q", query), ("per_page", per_page.as_str())])
            })
            .await
            .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))
    }

    async fn details(&self, login: &str) -> Result<UserDetails, AdapterError> {
        let url = format!("{}/users/{login}", self.base_url);
        self.http
            .send_json(SOURCE_TAG, |client| self.request(client, &url))
            .await
            .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))
    }
}

/// Map a search hit plus its detail payload into a raw talent record.
pub fn talent_from_user(
    item: &SearchItem,
    details: &UserDetails,
    query: &str,
) -> Option<RawRecord> {
    let login = details.login.as_deref().or(item.login.as_deref())?;
    let url = details.html_url.as_deref().or(item.html_url.as_deref())?;

    let company = details
        .company
        .as_deref()
        .map(|c| c.trim().trim_start_matches('@'))
        .and_then(text_or_none);

    let mut notes = vec![format!("Found via GitHub search: '{query}'")];
    if let Some(bio) = details.bio.as_deref().and_then(text_or_none) {
        notes.push(format!("Bio: {}", bio.chars().take(180).collect::<String>()));
    }

    let name = details
        .name
        .as_deref()
        .and_then(text_or_none)
        .or_else(|| Some(login.to_string()));

    Some(raw_record([
        ("github_url", JsonValue::from(url)),
        ("github_login", JsonValue::from(login)),
        ("name", opt_str(name)),
        ("current_company", opt_str(company)),
        ("location", opt_str(details.location.as_deref().and_then(text_or_none))),
        ("notes", JsonValue::from(notes.join(" | "))),
        ("open_to_work", details.hireable.map(JsonValue::from).unwrap_or(JsonValue::Null)),
    ]))
}

#[async_trait]
impl SourceAdapter for GithubSearchAdapter {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn category(&self) -> Category {
        Category::Talent
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        if self.token.is_none() {
            warn!("GITHUB_TOKEN not set; using unauthenticated search limits");
        }

        let mut out = Vec::new();
        for query in &self.queries {
            let page = self.search(query).await?;
            debug!(query = query.as_str(), hits = page.items.len(), "github search");
            for item in &page.items {
                let Some(login) = item.login.as_deref() else {
                    continue;
                };
                let details = match self.details(login).await {
                    Ok(details) => details,
                    Err(err @ AdapterError::Auth { .. }) => return Err(err),
                    Err(err) => {
                        warn!(login, error = %err, "skipping github user");
                        continue;
                    }
                };
                if let Some(record) = talent_from_user(item, &details, query) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_storage::HttpClientConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn company_handle_prefix_is_stripped() {
        let item = SearchItem {
            login: Some("ada".into()),
            html_url: Some("https://github.com/ada".into()),
        };
        let details = UserDetails {
            company: Some("@Boeing ".into()),
            bio: Some("Composite structures".into()),
            hireable: Some(true),
            ..Default::default()
        };
        let raw = talent_from_user(&item, &details, "Boeing composites").unwrap();
        assert_eq!(raw["current_company"], "Boeing");
        assert_eq!(raw["name"], "ada");
        assert_eq!(raw["open_to_work"], true);
        assert!(raw["notes"].as_str().unwrap().contains("Bio: Composite structures"));
    }

    #[test]
    fn hit_without_profile_url_is_skipped() {
        let item = SearchItem {
            login: Some("ghost".into()),
            html_url: None,
        };
        assert!(talent_from_user(&item, &UserDetails::default(), "q").is_none());
    }

    #[tokio::test]
    async fn searches_then_fetches_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/users"))
            .and(query_param("q", "Boeing aerodynamic engineer"))
            .and(header("Authorization", "Bearer gh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"login": "ada", "html_url": "https://github.com/ada"}, {"login": null}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/ada"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": "ada", "name": "Ada L", "company": "Boeing", "location": "Seattle"
            })))
            .mount(&server)
            .await;

        let http = Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap());
        let adapter = GithubSearchAdapter::new(
            http,
            Some("gh-token".into()),
            vec!["Boeing aerodynamic engineer".into()],
            5,
        )
        .with_base_url(server.uri());
        let records = adapter.produce().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "Ada L");
        assert_eq!(records[0]["github_url"], "https://github.com/ada");
    }

    #[tokio::test]
    async fn rejected_token_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;
        let http = Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap());
        let adapter = GithubSearchAdapter::new(http, Some("bad".into()), vec!["q".into()], 5)
            .with_base_url(server.uri());
        assert!(matches!(adapter.produce().await, Err(AdapterError::Auth { .. })));
    }
}
