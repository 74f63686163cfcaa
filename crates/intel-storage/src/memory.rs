//! In-process store with the same upsert semantics as the real backends. Backs `--dry-run`.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use intel_core::{Category, Priority, ScoredRecord};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::Mutex;

use crate::gateway::{
    FailureKind, GatewayError, PersistFailure, PersistedRow, PersistenceGateway, UpsertOutcome,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub conflict_key: String,
    pub source_tag: String,
    pub priority: Priority,
    pub score: u8,
    pub fields: Map<String, JsonValue>,
    pub discovered_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    tables: Mutex<BTreeMap<Category, BTreeMap<String, StoredRow>>>,
    rejected: HashSet<(Category, String)>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert of `conflict_key` fail with a constraint violation.
    pub fn with_rejected_key(
        mut self,
        category: Category,
        conflict_key: impl Into<String>,
    ) -> Self {
        self.rejected.insert((category, conflict_key.into()));
        self
    }

    pub async fn row(&self, category: Category, conflict_key: &str) -> Option<StoredRow> {
        let tables = self.tables.lock().await;
        tables.get(&category)?.get(conflict_key).cloned()
    }

    pub async fn rows(&self, category: Category) -> Vec<StoredRow> {
        let tables = self.tables.lock().await;
        tables
            .get(&category)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, category: Category) -> usize {
        let tables = self.tables.lock().await;
        tables.get(&category).map(BTreeMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn upsert(
        &self,
        category: Category,
        records: &[ScoredRecord],
    ) -> Result<UpsertOutcome, GatewayError> {
        let mut tables = self.tables.lock().await;
        let table = tables.entry(category).or_default();
        let mut outcome = UpsertOutcome::default();

        for record in records {
            let key = record.conflict_key();
            if record.category() != category {
                outcome.push(
                    key,
                    Err(PersistFailure::new(
                        FailureKind::Rejected,
                        format!("{} record sent to {} table", record.category(), category.table()),
                    )),
                );
                continue;
            }
            if self.rejected.contains(&(category, key.to_string())) {
                outcome.push(
                    key,
                    Err(PersistFailure::new(
                        FailureKind::Constraint,
                        format!("constraint violation on {}", category.conflict_column()),
                    )),
                );
                continue;
            }

            let now = Utc::now();
            let fields = record.record.fields.to_json_map();
            let row = match table.entry(key.to_string()) {
                Entry::Occupied(slot) => {
                    let existing = slot.into_mut();
                    existing.fields.extend(fields);
                    existing.source_tag = record.record.source_tag.clone();
                    existing.priority = record.priority;
                    existing.score = record.score;
                    // Keep last_updated strictly increasing even on coarse clocks.
                    existing.last_updated =
                        now.max(existing.last_updated + Duration::microseconds(1));
                    existing
                }
                Entry::Vacant(slot) => slot.insert(StoredRow {
                    conflict_key: key.to_string(),
                    source_tag: record.record.source_tag.clone(),
                    priority: record.priority,
                    score: record.score,
                    fields,
                    discovered_at: record.record.discovered_at,
                    last_updated: now,
                }),
            };

            outcome.push(
                key,
                Ok(PersistedRow {
                    conflict_key: row.conflict_key.clone(),
                    discovered_at: Some(row.discovered_at),
                    last_updated: Some(row.last_updated),
                }),
            );
        }

        Ok(outcome)
    }
}
