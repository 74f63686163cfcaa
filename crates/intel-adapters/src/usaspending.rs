//! Federal contract awards from the USASpending.gov award search API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::{opt_str, raw_record, text_or_none, AdapterError, SourceAdapter};

const SOURCE_TAG: &str = "usaspending";
const DEFAULT_BASE_URL: &str = "https://api.usaspending.gov";
/// Award search history does not reach further back than fiscal year 2008.
const MAX_LOOKBACK_DAYS: i64 = 20 * 365;
const RESULT_FIELDS: [&str; 5] = [
    "Award ID",
    "Recipient Name",
    "Award Amount",
    "Description",
    "Start Date",
];

pub struct UsaSpendingAdapter {
    http: Arc<HttpFetcher>,
    keywords: Vec<String>,
    recipients: Vec<String>,
    lookback_days: i64,
    min_award_usd: f64,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AwardPage {
    #[serde(default)]
    pub results: Vec<Map<String, JsonValue>>,
}

impl UsaSpendingAdapter {
    pub fn new(
        http: Arc<HttpFetcher>,
        keywords: Vec<String>,
        recipients: Vec<String>,
        lookback_days: i64,
        min_award_usd: f64,
    ) -> Self {
        Self {
            http,
            keywords,
            recipients,
            lookback_days,
            min_award_usd,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_body(&self, today: NaiveDate) -> JsonValue {
        let start = today - Duration::days(self.lookback_days.clamp(1, MAX_LOOKBACK_DAYS));
        json!({
            "filters": {
                "keywords": self.keywords,
                "time_period": [{
                    "start_date": start.format("%Y-%m-%d").to_string(),
                    "end_date": today.format("%Y-%m-%d").to_string(),
                }],
                "award_type_codes": ["A", "B", "C", "D"],
                "award_amounts": [{"lower_bound": self.min_award_usd}],
            },
            "fields": RESULT_FIELDS,
            "limit": 50,
            "page": 1,
        })
    }
}

/// Keep awards whose recipient matches a watched company (case-insensitive substring).
pub fn parse_awards(page: AwardPage, recipients: &[String]) -> Vec<RawRecord> {
    let watched: Vec<String> = recipients.iter().map(|r| r.to_lowercase()).collect();
    page.results
        .into_iter()
        .filter_map(|award| {
            let recipient = award.get("Recipient Name").and_then(JsonValue::as_str)?;
            let lower = recipient.to_lowercase();
            if !watched.is_empty() && !watched.iter().any(|w| lower.contains(w.as_str())) {
                return None;
            }
            let text =
                |key: &str| award.get(key).and_then(JsonValue::as_str).and_then(text_or_none);
            let source_url = award
                .get("generated_internal_id")
                .and_then(JsonValue::as_str)
                .map(|id| format!("https://www.usaspending.gov/award/{id}"));
            Some(raw_record([
                ("award_id", opt_str(text("Award ID"))),
                ("recipient_name", JsonValue::from(recipient)),
                ("news_type", JsonValue::from("Federal Contract")),
                ("award_amount", award.get("Award Amount").cloned().unwrap_or(JsonValue::Null)),
                ("description", opt_str(text("Description"))),
                ("action_date", opt_str(text("Start Date"))),
                ("source_url", opt_str(source_url)),
            ]))
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for UsaSpendingAdapter {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn category(&self) -> Category {
        Category::CompetitorMove
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let url = format!("{}/api/v2/search/spending_by_award/", self.base_url);
        let body = self.request_body(Utc::now().date_naive());
        let page: AwardPage = self
            .http
            .send_json(SOURCE_TAG, |client| client.post(&url).json(&body))
            .await
            .map_err(|err| AdapterError::fetch(SOURCE_TAG, err))?;
        let total = page.results.len();
        let awards = parse_awards(page, &self.recipients);
        debug!(total, kept = awards.len(), "award search");
        Ok(awards)
    }
}
