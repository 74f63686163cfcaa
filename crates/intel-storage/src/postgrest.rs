//! PostgREST (Supabase REST) backend: one conflict-aware upsert request per record.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intel_core::{Category, ScoredRecord};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::gateway::{
    row_payload, FailureKind, GatewayError, PersistFailure, PersistedRow, PersistenceGateway,
    UpsertOutcome,
};

#[derive(Debug, Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Error body PostgREST returns on a failed write.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl RestGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building store client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, category: Category) -> String {
        format!("{}/rest/v1/{}", self.base_url, category.table())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn upsert_one(
        &self,
        category: Category,
        record: &ScoredRecord,
    ) -> Result<Result<PersistedRow, PersistFailure>, GatewayError> {
        let body = JsonValue::Object(row_payload(record, Utc::now()));
        let request = self
            .authorized(self.client.post(self.table_url(category)))
            .query(&[("on_conflict", category.conflict_column())])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body);

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                return Ok(Err(PersistFailure::new(FailureKind::Transport, err.to_string())));
            }
        };

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Unauthorized(format!("{status}: {text}")));
        }

        let text = match resp.text().await {
            Ok(text) => text,
            Err(err) => {
                return Ok(Err(PersistFailure::new(
                    FailureKind::Transport,
                    err.to_string(),
                )))
            }
        };

        if status.is_success() {
            return Ok(Ok(persisted_from_echo(record.conflict_key(), category, &text)));
        }

        Ok(Err(failure_from_response(status, &text)))
    }
}

fn persisted_from_echo(conflict_key: &str, category: Category, text: &str) -> PersistedRow {
    let rows: Vec<Map<String, JsonValue>> = serde_json::from_str(text).unwrap_or_default();
    let row = rows.into_iter().next().unwrap_or_default();
    let timestamp = |name: &str| {
        row.get(name)
            .and_then(JsonValue::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    };
    PersistedRow {
        conflict_key: row
            .get(category.conflict_column())
            .and_then(JsonValue::as_str)
            .unwrap_or(conflict_key)
            .to_string(),
        discovered_at: timestamp("discovered_at"),
        last_updated: timestamp("last_updated"),
    }
}

fn failure_from_response(status: StatusCode, text: &str) -> PersistFailure {
    let parsed: Option<PostgrestError> = serde_json::from_str(text).ok();
    let code = parsed.as_ref().and_then(|e| e.code.clone()).unwrap_or_default();
    let kind = if status == StatusCode::CONFLICT || code.starts_with("23") {
        FailureKind::Constraint
    } else if status.is_server_error() {
        FailureKind::Transport
    } else {
        FailureKind::Rejected
    };
    let detail = match parsed {
        Some(err) => {
            let mut detail = format!("{status} {code}: {}", err.message.unwrap_or_default());
            if let Some(extra) = err.details {
                detail.push_str(" (");
                detail.push_str(&extra);
                detail.push(')');
            }
            detail
        }
        None => format!("{status}: {}", text.chars().take(200).collect::<String>()),
    };
    PersistFailure::new(kind, detail)
}

#[async_trait]
impl PersistenceGateway for RestGateway {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let url = format!("{}/rest/v1/", self.base_url);
        let resp = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|err| GatewayError::Unreachable(format!("{url}: {err}")))?;
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(GatewayError::Unauthorized(format!("{} from {url}", resp.status())))
            }
            status if status.is_server_error() => {
                Err(GatewayError::Unreachable(format!("{status} from {url}")))
            }
            _ => Ok(()),
        }
    }

    async fn upsert(
        &self,
        category: Category,
        records: &[ScoredRecord],
    ) -> Result<UpsertOutcome, GatewayError> {
        let mut outcome = UpsertOutcome::default();
        for record in records {
            let result = self.upsert_one(category, record).await?;
            match &result {
                Ok(_) => debug!(table = category.table(), key = record.conflict_key(), "upserted"),
                Err(failure) => warn!(
                    table = category.table(),
                    key = record.conflict_key(),
                    kind = ?failure.kind,
                    detail = failure.detail.as_str(),
                    "row rejected"
                ),
            }
            outcome.push(record.conflict_key(), result);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_constraint() {
        let failure = failure_from_response(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value","details":"Key (job_id) exists"}"#,
        );
        assert_eq!(failure.kind, FailureKind::Constraint);
        assert!(failure.detail.contains("duplicate key value"));
        assert!(failure.detail.contains("Key (job_id) exists"));
    }

    #[test]
    fn unknown_column_maps_to_rejected() {
        let failure = failure_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"code":"PGRST204","message":"Could not find the 'skills' column"}"#,
        );
        assert_eq!(failure.kind, FailureKind::Rejected);
    }

    #[test]
    fn echo_parsing_reads_store_timestamps() {
        let row = persisted_from_echo(
            "fallback",
            Category::News,
            r#"[{"url":"https://example.com/a",
                 "discovered_at":"2026-01-02T03:04:05+00:00",
                 "last_updated":"2026-02-02T03:04:05Z"}]"#,
        );
        assert_eq!(row.conflict_key, "https://example.com/a");
        assert!(row.discovered_at.is_some());
        assert!(row.last_updated.unwrap() > row.discovered_at.unwrap());
    }
}
