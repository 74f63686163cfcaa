//! Supplier financial snapshots from Alpha Vantage: quote, company overview and latest headline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::{opt_str, raw_record, text_or_none, AdapterError, SourceAdapter};

const SOURCE_TAG: &str = "alpha_vantage";
const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub ticker: String,
    pub name: String,
}

pub struct AlphaVantageAdapter {
    http: Arc<HttpFetcher>,
    api_key: Option<String>,
    tickers: Vec<TickerEntry>,
    min_interval: Duration,
    base_url: String,
}

/// Alpha Vantage answers 200 with an explanatory body when a call is refused.
#[derive(Debug, PartialEq)]
pub enum Refusal {
    Auth(String),
    Throttled(String),
}

pub fn refusal(body: &Map<String, JsonValue>) -> Option<Refusal> {
    let message = ["Error Message", "Information", "Note"]
        .iter()
        .find_map(|key| body.get(*key).and_then(JsonValue::as_str))?;
    let lower = message.to_lowercase();
    if lower.contains("apikey") || lower.contains("api key") {
        if lower.contains("rate limit") || lower.contains("per day") {
            return Some(Refusal::Throttled(message.to_string()));
        }
        return Some(Refusal::Auth(message.to_string()));
    }
    Some(Refusal::Throttled(message.to_string()))
}

fn str_field(map: &Map<String, JsonValue>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(JsonValue::as_str)
        .filter(|v| *v != "None" && *v != "-")
        .and_then(text_or_none)
}

/// Combine the three payloads for one supplier. Numbers stay as the provider's strings and are
/// parsed by the normalizer. Returns `None` when the quote is empty.
pub fn supplier_record(
    entry: &TickerEntry,
    quote: &Map<String, JsonValue>,
    overview: Option<&Map<String, JsonValue>>,
    news: Option<&Map<String, JsonValue>>,
) -> Option<RawRecord> {
    let quote = quote.get("Global Quote")?.as_object().filter(|q| !q.is_empty())?;
    let headline = news
        .and_then(|n| n.get("feed"))
        .and_then(JsonValue::as_array)
        .and_then(|feed| feed.first())
        .and_then(|item| item.get("title"))
        .and_then(JsonValue::as_str)
        .and_then(text_or_none);
    let overview_field = |key: &str| overview.and_then(|o| str_field(o, key));

    Some(raw_record([
        ("supplier_name", JsonValue::from(entry.name.as_str())),
        ("ticker", JsonValue::from(entry.ticker.as_str())),
        ("stock_price", opt_str(str_field(quote, "05. price"))),
        ("price_change_percent", opt_str(str_field(quote, "10. change percent"))),
        ("market_cap", opt_str(overview_field("MarketCapitalization"))),
        ("profit_margin", opt_str(overview_field("ProfitMargin"))),
        ("headline", opt_str(headline)),
    ]))
}

impl AlphaVantageAdapter {
    pub fn new(http: Arc<HttpFetcher>, api_key: Option<String>, tickers: Vec<TickerEntry>) -> Self {
        Self {
            http,
            api_key,
            tickers,
            min_interval: Duration::from_secs(12),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Pause between consecutive calls; the free tier allows five per minute.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn query(
        &self,
        api_key: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Map<String, JsonValue>>, AdapterError> {
        let url = format!("{}/query", self.base_url);
        let body: Map<String, JsonValue> = self
            .http
            .send_json(SOURCE_TAG, |client| {
                client.get(&url).query(params).query(&[("apikey", api_key)])
            })
            .await
            .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))?;
        match refusal(&body) {
            Some(Refusal::Auth(detail)) => Err(AdapterError::Auth {
                source_tag: SOURCE_TAG.to_string(),
                detail,
            }),
            Some(Refusal::Throttled(detail)) => {
                warn!(detail = detail.as_str(), "alpha vantage refused call");
                Ok(None)
            }
            None => Ok(Some(body)),
        }
    }

    async fn pause(&self) {
        if !self.min_interval.is_zero() {
            tokio::time::sleep(self.min_interval).await;
        }
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn category(&self) -> Category {
        Category::SupplierHealth
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AdapterError::MissingCredential {
            source_tag: SOURCE_TAG.to_string(),
            var: "ALPHAVANTAGE_API_KEY",
        })?;

        let mut out = Vec::new();
        for (i, entry) in self.tickers.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            let ticker = entry.ticker.as_str();
            let Some(quote) = self
                .query(api_key, &[("function", "GLOBAL_QUOTE"), ("symbol", ticker)])
                .await?
            else {
                continue;
            };
            self.pause().await;
            let overview = self
                .query(api_key, &[("function", "OVERVIEW"), ("symbol", ticker)])
                .await?;
            self.pause().await;
            let news_params = [("function", "NEWS_SENTIMENT"), ("tickers", ticker), ("limit", "3")];
            let news = self.query(api_key, &news_params).await?;

            match supplier_record(entry, &quote, overview.as_ref(), news.as_ref()) {
                Some(record) => out.push(record),
                None => debug!(ticker, "no quote data"),
            }
        }
        Ok(out)
    }
}
