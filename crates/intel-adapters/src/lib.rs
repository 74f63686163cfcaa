//! Source adapter contract plus the concrete adapters for each intelligence source.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::{FetchError, HttpFetcher};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod alpha_vantage;
pub mod fixture;
pub mod github;
mod html;
pub mod jobs;
pub mod news_rss;
pub mod patents;
pub mod serper;
pub mod usaspending;

pub use alpha_vantage::{AlphaVantageAdapter, TickerEntry};
pub use fixture::FixtureAdapter;
pub use github::GithubSearchAdapter;
pub use jobs::{BoardFlavor, JobBoardAdapter};
pub use news_rss::GoogleNewsRssAdapter;
pub use patents::GooglePatentsAdapter;
pub use serper::SerperLinkedinAdapter;
pub use usaspending::UsaSpendingAdapter;

pub const CRATE_NAME: &str = "intel-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{source_tag}: missing credential {var}")]
    MissingCredential { source_tag: String, var: &'static str },
    #[error("{source_tag}: authentication rejected: {detail}")]
    Auth { source_tag: String, detail: String },
    #[error("{source_tag}: {source}")]
    Fetch {
        source_tag: String,
        #[source]
        source: FetchError,
    },
    #[error("{source_tag}: unparseable payload: {detail}")]
    Parse { source_tag: String, detail: String },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AdapterError {
    pub fn fetch(source_tag: &str, err: FetchError) -> Self {
        if err.is_auth() {
            AdapterError::Auth {
                source_tag: source_tag.to_string(),
                detail: err.to_string(),
            }
        } else {
            AdapterError::Fetch {
                source_tag: source_tag.to_string(),
                source: err,
            }
        }
    }

    pub fn parse(source_tag: &str, detail: impl Into<String>) -> Self {
        AdapterError::Parse {
            source_tag: source_tag.to_string(),
            detail: detail.into(),
        }
    }
}

/// One external source. `produce` returns `Ok(vec![])` for "nothing found" and reserves
/// errors for conditions that make the whole source unusable.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_tag(&self) -> &str;
    fn category(&self) -> Category;

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError>;
}

/// API credentials, read from the environment only.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub serper_api_key: Option<String>,
    pub alphavantage_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            github_token: var("GITHUB_TOKEN"),
            serper_api_key: var("SERPER_API_KEY"),
            alphavantage_api_key: var("ALPHAVANTAGE_API_KEY"),
        }
    }
}

fn default_per_page() -> u8 {
    5
}

fn default_results() -> usize {
    10
}

fn default_min_interval_secs() -> u64 {
    12
}

fn default_lookback_days() -> i64 {
    90
}

fn default_min_award() -> f64 {
    1_000_000.0
}

/// Typed configuration entry for one adapter, tagged by `kind` in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterConfig {
    Fixture {
        path: PathBuf,
        #[serde(default)]
        source_tag: Option<String>,
    },
    GithubSearch {
        queries: Vec<String>,
        #[serde(default = "default_per_page")]
        per_page: u8,
    },
    SerperLinkedin {
        queries: Vec<String>,
        #[serde(default = "default_results")]
        results_per_query: usize,
    },
    LeverBoard {
        company: String,
        url: String,
    },
    GreenhouseBoard {
        company: String,
        url: String,
    },
    GooglePatents {
        queries: Vec<String>,
        #[serde(default = "default_results")]
        max_results: usize,
    },
    AlphaVantage {
        tickers: Vec<TickerEntry>,
        #[serde(default = "default_min_interval_secs")]
        min_interval_secs: u64,
    },
    GoogleNewsRss {
        topics: Vec<String>,
        #[serde(default = "default_results")]
        results_per_topic: usize,
    },
    UsaSpending {
        keywords: Vec<String>,
        recipients: Vec<String>,
        #[serde(default = "default_lookback_days")]
        lookback_days: i64,
        #[serde(default = "default_min_award")]
        min_award_usd: f64,
    },
}

impl AdapterConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterConfig::Fixture { .. } => "fixture",
            AdapterConfig::GithubSearch { .. } => "github_search",
            AdapterConfig::SerperLinkedin { .. } => "serper_linkedin",
            AdapterConfig::LeverBoard { .. } => "lever_board",
            AdapterConfig::GreenhouseBoard { .. } => "greenhouse_board",
            AdapterConfig::GooglePatents { .. } => "google_patents",
            AdapterConfig::AlphaVantage { .. } => "alpha_vantage",
            AdapterConfig::GoogleNewsRss { .. } => "google_news_rss",
            AdapterConfig::UsaSpending { .. } => "usaspending",
        }
    }

    /// Category the adapter can feed; `None` for adapters that fit any phase.
    pub fn native_category(&self) -> Option<Category> {
        match self {
            AdapterConfig::Fixture { .. } => None,
            AdapterConfig::GithubSearch { .. } | AdapterConfig::SerperLinkedin { .. } => {
                Some(Category::Talent)
            }
            AdapterConfig::LeverBoard { .. } | AdapterConfig::GreenhouseBoard { .. } => {
                Some(Category::JobPosting)
            }
            AdapterConfig::GooglePatents { .. } => Some(Category::Patent),
            AdapterConfig::AlphaVantage { .. } => Some(Category::SupplierHealth),
            AdapterConfig::GoogleNewsRss { .. } => Some(Category::News),
            AdapterConfig::UsaSpending { .. } => Some(Category::CompetitorMove),
        }
    }
}

#[derive(Debug, Error)]
#[error("{kind} adapter produces {native} records and cannot feed the {requested} phase")]
pub struct CategoryConflict {
    pub kind: &'static str,
    pub native: Category,
    pub requested: Category,
}

/// Instantiate the adapter described by `config` for a phase of `category`.
pub fn build_adapter(
    config: &AdapterConfig,
    category: Category,
    http: Arc<HttpFetcher>,
    credentials: &Credentials,
) -> Result<Box<dyn SourceAdapter>, CategoryConflict> {
    if let Some(native) = config.native_category() {
        if native != category {
            return Err(CategoryConflict {
                kind: config.kind(),
                native,
                requested: category,
            });
        }
    }

    let adapter: Box<dyn SourceAdapter> = match config {
        AdapterConfig::Fixture { path, source_tag } => {
            let mut adapter = FixtureAdapter::new(category, path.clone());
            if let Some(tag) = source_tag {
                adapter = adapter.with_source_tag(tag.clone());
            }
            Box::new(adapter)
        }
        AdapterConfig::GithubSearch { queries, per_page } => Box::new(GithubSearchAdapter::new(
            http,
            credentials.github_token.clone(),
            queries.clone(),
            *per_page,
        )),
        AdapterConfig::SerperLinkedin {
            queries,
            results_per_query,
        } => Box::new(SerperLinkedinAdapter::new(
            http,
            credentials.serper_api_key.clone(),
            queries.clone(),
            *results_per_query,
        )),
        AdapterConfig::LeverBoard { company, url } => {
            Box::new(JobBoardAdapter::new(http, BoardFlavor::Lever, company.clone(), url.clone()))
        }
        AdapterConfig::GreenhouseBoard { company, url } => Box::new(JobBoardAdapter::new(
            http,
            BoardFlavor::Greenhouse,
            company.clone(),
            url.clone(),
        )),
        AdapterConfig::GooglePatents {
            queries,
            max_results,
        } => Box::new(GooglePatentsAdapter::new(http, queries.clone(), *max_results)),
        AdapterConfig::AlphaVantage {
            tickers,
            min_interval_secs,
        } => Box::new(
            AlphaVantageAdapter::new(
                http,
                credentials.alphavantage_api_key.clone(),
                tickers.clone(),
            )
            .with_min_interval(std::time::Duration::from_secs(*min_interval_secs)),
        ),
        AdapterConfig::GoogleNewsRss {
            topics,
            results_per_topic,
        } => Box::new(GoogleNewsRssAdapter::new(http, topics.clone(), *results_per_topic)),
        AdapterConfig::UsaSpending {
            keywords,
            recipients,
            lookback_days,
            min_award_usd,
        } => Box::new(UsaSpendingAdapter::new(
            http,
            keywords.clone(),
            recipients.clone(),
            *lookback_days,
            *min_award_usd,
        )),
    };
    Ok(adapter)
}

/// Build a raw record from `(key, value)` pairs, skipping nulls.
pub(crate) fn raw_record<I, K>(pairs: I) -> RawRecord
where
    I: IntoIterator<Item = (K, JsonValue)>,
    K: Into<String>,
{
    pairs
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.into(), v))
        .collect()
}

pub(crate) fn text_or_none(value: &str) -> Option<String> {
    let trimmed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub(crate) fn opt_str(value: Option<String>) -> JsonValue {
    value.map(JsonValue::String).unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_storage::HttpClientConfig;

    fn http() -> Arc<HttpFetcher> {
        Arc::new(HttpFetcher::new(HttpClientConfig::default()).unwrap())
    }

    #[test]
    fn adapter_config_reads_tagged_yaml_shape() {
        let config: AdapterConfig = serde_json::from_value(serde_json::json!({
            "kind": "github_search",
            "queries": ["Boeing aerodynamic engineer"]
        }))
        .unwrap();
        assert_eq!(
            config,
            AdapterConfig::GithubSearch {
                queries: vec!["Boeing aerodynamic engineer".into()],
                per_page: 5
            }
        );
    }

    #[test]
    fn build_refuses_adapter_in_the_wrong_phase() {
        let config = AdapterConfig::GooglePatents {
            queries: vec!["bwb".into()],
            max_results: 3,
        };
        let err = match build_adapter(&config, Category::News, http(), &Credentials::default()) {
            Err(err) => err,
            Ok(_) => panic!("patents adapter accepted for news phase"),
        };
        assert_eq!(err.native, Category::Patent);
        assert_eq!(err.requested, Category::News);
    }

    #[test]
    fn fixture_adapter_takes_the_phase_category() {
        let config = AdapterConfig::Fixture {
            path: "fixtures/warn_layoffs.json".into(),
            source_tag: Some("warn".into()),
        };
        let adapter =
            build_adapter(&config, Category::Talent, http(), &Credentials::default()).unwrap();
        assert_eq!(adapter.category(), Category::Talent);
        assert_eq!(adapter.source_tag(), "warn");
    }

    #[test]
    fn raw_record_drops_nulls() {
        let raw = raw_record([("a", JsonValue::from("x")), ("b", JsonValue::Null)]);
        assert_eq!(raw.len(), 1);
        assert_eq!(text_or_none("  Lead \n Engineer "), Some("Lead Engineer".into()));
        assert_eq!(text_or_none("   "), None);
    }
}
