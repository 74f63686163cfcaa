//! Direct Postgres backend. Fields live in a `jsonb` column so the upsert can merge with `||`,
//! which gives the same "non-null overwrites, absent stays" semantics as the REST store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intel_core::{Category, ScoredRecord};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::gateway::{
    FailureKind, GatewayError, PersistFailure, PersistedRow, PersistenceGateway, UpsertOutcome,
};

#[derive(Debug, Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub async fn connect(database_url: &str) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("store migrations applied");
        Ok(())
    }
}

pub(crate) fn upsert_sql(category: Category) -> String {
    let table = format!("intel.{}", category.table());
    format!(
        "INSERT INTO {table} \
         (conflict_key, source_tag, priority, score, signals, fields, discovered_at, last_updated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
         ON CONFLICT (conflict_key) DO UPDATE SET \
         source_tag = EXCLUDED.source_tag, \
         priority = EXCLUDED.priority, \
         score = EXCLUDED.score, \
         signals = EXCLUDED.signals, \
         fields = {table}.fields || EXCLUDED.fields, \
         last_updated = greatest(now(), {table}.last_updated + interval '1 microsecond') \
         RETURNING conflict_key, discovered_at, last_updated"
    )
}

fn classify_sqlx_error(err: &sqlx::Error) -> FailureKind {
    match err {
        sqlx::Error::Database(db) => {
            if db.code().is_some_and(|code| code.starts_with("23")) {
                FailureKind::Constraint
            } else {
                FailureKind::Rejected
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            FailureKind::Transport
        }
        _ => FailureKind::Rejected,
    }
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;
        Ok(())
    }

    async fn upsert(
        &self,
        category: Category,
        records: &[ScoredRecord],
    ) -> Result<UpsertOutcome, GatewayError> {
        let sql = upsert_sql(category);
        let mut outcome = UpsertOutcome::default();

        for record in records {
            let signals = serde_json::to_value(&record.signals).unwrap_or(JsonValue::Null);
            let fields = JsonValue::Object(record.record.fields.to_json_map());
            let result = sqlx::query(&sql)
                .bind(&record.record.conflict_key)
                .bind(&record.record.source_tag)
                .bind(record.priority.as_str())
                .bind(i16::from(record.score))
                .bind(signals)
                .bind(fields)
                .bind(record.record.discovered_at)
                .fetch_one(&self.pool)
                .await;

            let result = match result {
                Ok(row) => Ok(PersistedRow {
                    conflict_key: row
                        .try_get("conflict_key")
                        .unwrap_or_else(|_| record.conflict_key().to_string()),
                    discovered_at: row.try_get::<DateTime<Utc>, _>("discovered_at").ok(),
                    last_updated: row.try_get::<DateTime<Utc>, _>("last_updated").ok(),
                }),
                Err(err) => {
                    let failure = PersistFailure::new(classify_sqlx_error(&err), err.to_string());
                    warn!(
                        table = category.table(),
                        key = record.conflict_key(),
                        error = %err,
                        "row rejected"
                    );
                    Err(failure)
                }
            };
            outcome.push(record.conflict_key(), result);
        }

        Ok(outcome)
    }
}
