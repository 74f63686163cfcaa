//! Persistence gateway contract shared by every store backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intel_core::{Category, ScoredRecord};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Whole-store failure. Per-record problems are reported through [`UpsertOutcome`] instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store rejected credentials: {0}")]
    Unauthorized(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("running migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unique/check/not-null violation reported by the store.
    Constraint,
    /// Store refused the row for another reason (bad column, payload too large, ...).
    Rejected,
    /// The request for this row never got an answer.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind:?}: {detail}")]
pub struct PersistFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl PersistFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Row as the store reports it after the upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRow {
    pub conflict_key: String,
    pub discovered_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowOutcome {
    pub conflict_key: String,
    pub result: Result<PersistedRow, PersistFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpsertOutcome {
    pub rows: Vec<RowOutcome>,
}

impl UpsertOutcome {
    pub fn push(&mut self, conflict_key: &str, result: Result<PersistedRow, PersistFailure>) {
        self.rows.push(RowOutcome {
            conflict_key: conflict_key.to_string(),
            result,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.rows.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PersistFailure)> {
        self.rows
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r.conflict_key.as_str(), e)))
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap reachability/credential check, run once at startup.
    async fn ping(&self) -> Result<(), GatewayError>;

    /// Upsert one batch keyed by conflict key. Non-null fields overwrite stored values, absent
    /// fields are left untouched, `last_updated` is refreshed and `discovered_at` is kept.
    async fn upsert(
        &self,
        category: Category,
        records: &[ScoredRecord],
    ) -> Result<UpsertOutcome, GatewayError>;
}

/// Flat JSON row for table-per-category stores: the populated fields plus the conflict column
/// and the scoring columns. `discovered_at` is deliberately absent so an update never moves it.
pub fn row_payload(record: &ScoredRecord, now: DateTime<Utc>) -> Map<String, JsonValue> {
    let category = record.category();
    let mut row = record.record.fields.to_json_map();
    row.insert(
        category.conflict_column().to_string(),
        JsonValue::String(record.record.conflict_key.clone()),
    );
    row.insert("source_tag".into(), JsonValue::String(record.record.source_tag.clone()));
    row.insert("priority".into(), JsonValue::String(record.priority.as_str().to_string()));
    row.insert("score".into(), JsonValue::from(record.score));
    row.insert("last_updated".into(), JsonValue::String(now.to_rfc3339()));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::{IntelRecord, Patent, Priority, RecordFields};

    #[test]
    fn payload_carries_conflict_column_without_discovered_at() {
        let record = ScoredRecord {
            record: IntelRecord {
                conflict_key: "US1234567B2".into(),
                source_tag: "google_patents".into(),
                discovered_at: Utc::now(),
                fields: RecordFields::Patent(Patent {
                    title: Some("Blended wing body freighter".into()),
                    ..Default::default()
                }),
            },
            score: 50,
            priority: Priority::High,
            signals: vec![],
        };
        let row = row_payload(&record, Utc::now());
        assert_eq!(row["patent_number"], "US1234567B2");
        assert_eq!(row["priority"], "HIGH");
        assert_eq!(row["score"], 50);
        assert!(!row.contains_key("discovered_at"));
        assert!(!row.contains_key("assignee"));
    }

    #[test]
    fn outcome_counts_successes_and_failures() {
        let mut outcome = UpsertOutcome::default();
        outcome.push(
            "a",
            Ok(PersistedRow {
                conflict_key: "a".into(),
                discovered_at: None,
                last_updated: None,
            }),
        );
        outcome.push("b", Err(PersistFailure::new(FailureKind::Constraint, "duplicate")));
        assert_eq!(outcome.succeeded(), 1);
        let failures: Vec<_> = outcome.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
    }
}
