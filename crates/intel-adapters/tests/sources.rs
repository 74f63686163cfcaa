use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use intel_adapters::{
    build_adapter, AdapterConfig, AdapterError, Credentials, GooglePatentsAdapter, SourceAdapter,
};
use intel_core::Category;
use intel_storage::{BackoffPolicy, HttpClientConfig, HttpFetcher};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> Arc<HttpFetcher> {
    Arc::new(
        HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(5),
            backoff: BackoffPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            ..Default::default()
        })
        .expect("fetcher"),
    )
}

#[tokio::test]
async fn repository_fixture_feeds_a_competitor_move_phase() {
    let fixture =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/warn_layoffs.json");
    let config = AdapterConfig::Fixture {
        path: fixture,
        source_tag: None,
    };
    let adapter = build_adapter(&config, Category::CompetitorMove, http(), &Credentials::default())
        .expect("fixture fits any phase");

    assert_eq!(adapter.source_tag(), "fixture:warn_layoffs");
    let records = adapter.produce().await.expect("fixture records");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["company"], "Spirit AeroSystems");
}

#[tokio::test]
async fn patent_search_page_is_fetched_per_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "blended wing body"))
        .and(query_param("oq", "blended wing body"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<search-result-item>
                 <span itemprop="publicationNumber">US11787533B2</span>
                 <span itemprop="title">Blended wing body aircraft</span>
               </search-result-item>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = GooglePatentsAdapter::new(http(), vec!["blended wing body".into()], 5)
        .with_base_url(server.uri());
    let records = adapter.produce().await.expect("patents");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["search_query"], "blended wing body");
    assert_eq!(
        records[0]["url"],
        format!("{}/patent/US11787533B2", server.uri()).as_str()
    );
}

#[tokio::test]
async fn blocked_patent_search_fails_the_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let adapter =
        GooglePatentsAdapter::new(http(), vec!["ducted fan".into()], 5).with_base_url(server.uri());
    let err = adapter.produce().await.unwrap_err();
    assert!(matches!(err, AdapterError::Auth { .. }), "got {err:?}");
}
