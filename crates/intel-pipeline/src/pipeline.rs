//! Phase orchestration: adapters, normalizer, dedup, scorer and gateway, one phase at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use intel_adapters::{AdapterError, SourceAdapter};
use intel_core::{Category, IntelRecord, Priority};
use intel_storage::{FailureKind, PersistenceGateway};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::InsightThresholds;
use crate::dedup::Deduplicator;
use crate::insights::{self, Insight, RunCounts};
use crate::normalize::normalize;
use crate::score::Scorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Pending => "PENDING",
            PhaseStatus::Running => "RUNNING",
            PhaseStatus::Completed => "COMPLETED",
            PhaseStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub conflict_key: String,
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub name: String,
    pub category: Category,
    pub status: PhaseStatus,
    /// Raw records produced by the adapters.
    pub records_in: usize,
    /// Records that survived normalization.
    pub records_out: usize,
    /// Records left after same-run dedup.
    pub unique: usize,
    pub persisted: usize,
    pub failures: Vec<RecordFailure>,
    /// Priorities of the persisted records.
    pub priority_counts: BTreeMap<Priority, usize>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl PhaseResult {
    fn pending(name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            category,
            status: PhaseStatus::Pending,
            records_in: 0,
            records_out: 0,
            unique: 0,
            persisted: 0,
            failures: Vec::new(),
            priority_counts: BTreeMap::new(),
            error: None,
            started_at: None,
            finished_at: None,
            duration_ms: None,
        }
    }

    pub fn skipped(&self) -> usize {
        self.records_in.saturating_sub(self.records_out)
    }

    fn finish(&mut self, status: PhaseStatus) {
        let finished_at = Utc::now();
        self.status = status;
        self.duration_ms = self
            .started_at
            .map(|started| (finished_at - started).num_milliseconds());
        self.finished_at = Some(finished_at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub phases: Vec<PhaseResult>,
    pub counts: RunCounts,
    pub insights: Vec<Insight>,
}

impl RunSummary {
    pub fn phase(&self, category: Category) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.category == category)
    }

    pub fn failed_phases(&self) -> impl Iterator<Item = &PhaseResult> {
        self.phases.iter().filter(|p| p.status == PhaseStatus::Failed)
    }

    pub fn total_persisted(&self) -> usize {
        self.phases.iter().map(|p| p.persisted).sum()
    }
}

/// One category's adapters, run in declaration order.
pub struct Phase {
    pub name: String,
    pub category: Category,
    pub adapters: Vec<Box<dyn SourceAdapter>>,
}

impl Phase {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        adapters: Vec<Box<dyn SourceAdapter>>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            adapters,
        }
    }
}

#[derive(Debug, Error)]
enum PhaseError {
    #[error("adapter failed: {0}")]
    Adapter(AdapterError),
    #[error("gateway failed: {0}")]
    Gateway(intel_storage::GatewayError),
}

pub struct Orchestrator {
    phases: Vec<Phase>,
    gateway: Arc<dyn PersistenceGateway>,
    scorer: Scorer,
    dedup: Deduplicator,
    thresholds: InsightThresholds,
    cancel: CancellationToken,
    running: Mutex<()>,
}

impl Orchestrator {
    pub fn new(phases: Vec<Phase>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            phases,
            gateway,
            scorer: Scorer::default(),
            dedup: Deduplicator::default(),
            thresholds: InsightThresholds::default(),
            cancel: CancellationToken::new(),
            running: Mutex::new(()),
        }
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_dedup(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_thresholds(mut self, thresholds: InsightThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Run unless another run on this orchestrator is still in flight.
    pub async fn try_run(&self) -> Option<RunSummary> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("previous run still in progress; skipping this trigger");
            return None;
        };
        Some(self.run_inner().await)
    }

    /// Execute every phase once. Failures are recorded in the summary, never returned.
    pub async fn run(&self) -> RunSummary {
        let _guard = self.running.lock().await;
        self.run_inner().await
    }

    async fn run_inner(&self) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, phases = self.phases.len(), store = self.gateway.name(), "run started");

        let mut results: Vec<PhaseResult> = self
            .phases
            .iter()
            .map(|p| PhaseResult::pending(&p.name, p.category))
            .collect();
        let mut status = RunStatus::Completed;

        for (phase, result) in self.phases.iter().zip(results.iter_mut()) {
            if self.cancel.is_cancelled() {
                warn!(
                    %run_id,
                    phase = phase.name.as_str(),
                    "run cancelled; remaining phases left pending"
                );
                status = RunStatus::Cancelled;
                break;
            }
            let span = info_span!(
                "phase",
                category = phase.category.as_str(),
                name = phase.name.as_str()
            );
            self.run_phase(phase, result).instrument(span).await;
        }

        let mut counts = RunCounts::default();
        for result in &results {
            for (&priority, &count) in &result.priority_counts {
                counts.add(result.category, priority, count);
            }
            if result.status == PhaseStatus::Failed {
                counts.failed_phases += 1;
            }
        }
        let insights = insights::evaluate(&counts, &self.thresholds);
        for insight in &insights {
            info!(
                trigger = insight.trigger.as_str(),
                count = insight.count,
                action = insight.recommended_action.as_str(),
                "insight"
            );
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            phases: results,
            counts,
            insights,
        };
        info!(
            %run_id,
            persisted = summary.total_persisted(),
            failed_phases = summary.counts.failed_phases,
            status = ?summary.status,
            "run finished"
        );
        summary
    }

    async fn run_phase(&self, phase: &Phase, result: &mut PhaseResult) {
        result.status = PhaseStatus::Running;
        result.started_at = Some(Utc::now());
        info!("phase started");

        match self.execute(phase, result).await {
            Ok(()) => {
                result.finish(PhaseStatus::Completed);
                info!(
                    records_in = result.records_in,
                    records_out = result.records_out,
                    unique = result.unique,
                    persisted = result.persisted,
                    failures = result.failures.len(),
                    duration_ms = result.duration_ms.unwrap_or_default(),
                    "phase completed"
                );
            }
            Err(err) => {
                result.error = Some(err.to_string());
                result.finish(PhaseStatus::Failed);
                warn!(error = %err, "phase failed");
            }
        }
    }

    async fn execute(&self, phase: &Phase, result: &mut PhaseResult) -> Result<(), PhaseError> {
        let now = Utc::now();
        let mut normalized: Vec<IntelRecord> = Vec::new();

        for adapter in &phase.adapters {
            let raw = adapter.produce().await.map_err(PhaseError::Adapter)?;
            result.records_in += raw.len();
            let before = normalized.len();
            normalized.extend(
                raw.iter()
                    .filter_map(|r| normalize(phase.category, r, adapter.source_tag(), now)),
            );
            info!(
                source = adapter.source_tag(),
                produced = raw.len(),
                normalized = normalized.len() - before,
                "adapter finished"
            );
        }
        result.records_out = normalized.len();

        let merged = self.dedup.merge(normalized);
        result.unique = merged.len();
        if merged.is_empty() {
            return Ok(());
        }

        let scored: Vec<_> = merged.into_iter().map(|r| self.scorer.score(r)).collect();
        let priorities: HashMap<&str, Priority> =
            scored.iter().map(|s| (s.conflict_key(), s.priority)).collect();

        let outcome = self
            .gateway
            .upsert(phase.category, &scored)
            .await
            .map_err(PhaseError::Gateway)?;

        for row in &outcome.rows {
            match &row.result {
                Ok(_) => {
                    result.persisted += 1;
                    if let Some(&priority) = priorities.get(row.conflict_key.as_str()) {
                        *result.priority_counts.entry(priority).or_default() += 1;
                    }
                }
                Err(failure) => {
                    warn!(
                        key = row.conflict_key.as_str(),
                        error = %failure,
                        "record not persisted"
                    );
                    result.failures.push(RecordFailure {
                        conflict_key: row.conflict_key.clone(),
                        kind: failure.kind,
                        detail: failure.detail.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use intel_core::RawRecord;
    use intel_storage::InMemoryGateway;
    use serde_json::json;

    struct Canned {
        category: Category,
        rows: Vec<serde_json::Value>,
    }

    #[async_trait]
    impl SourceAdapter for Canned {
        fn source_tag(&self) -> &str {
            "canned"
        }

        fn category(&self) -> Category {
            self.category
        }

        async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
            Ok(self
                .rows
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect())
        }
    }

    #[test]
    fn phase_errors_name_the_failing_stage() {
        let adapter = PhaseError::Adapter(AdapterError::parse("google_patents", "layout changed"));
        assert!(adapter.to_string().starts_with("adapter failed: "));
        assert!(adapter.to_string().contains("layout changed"));
        let gateway =
            PhaseError::Gateway(intel_storage::GatewayError::Unreachable("refused".into()));
        assert!(gateway.to_string().starts_with("gateway failed: "));
        assert!(gateway.to_string().contains("refused"));
    }

    #[tokio::test]
    async fn records_without_a_key_are_skipped_and_counted() {
        let adapter = Canned {
            category: Category::News,
            rows: vec![
                json!({"url": "https://example.com/a", "headline": "JetZero raises funding"}),
                json!({"headline": "no link"}),
            ],
        };
        let gateway = Arc::new(InMemoryGateway::new());
        let orchestrator = Orchestrator::new(
            vec![Phase::new("news", Category::News, vec![Box::new(adapter)])],
            gateway.clone(),
        );

        let summary = orchestrator.run().await;
        let news = &summary.phases[0];
        assert_eq!(news.status, PhaseStatus::Completed);
        assert_eq!(news.records_in, 2);
        assert_eq!(news.records_out, 1);
        assert_eq!(news.skipped(), 1);
        assert_eq!(news.persisted, 1);
        assert_eq!(news.priority_counts.values().sum::<usize>(), 1);
        assert_eq!(gateway.len(Category::News).await, 1);
        assert!(news.duration_ms.is_some());
    }

    #[tokio::test]
    async fn empty_phase_completes_without_touching_the_store() {
        let orchestrator = Orchestrator::new(
            vec![Phase::new("patents", Category::Patent, vec![])],
            Arc::new(InMemoryGateway::new()),
        );
        let summary = orchestrator.run().await;
        assert_eq!(summary.phases[0].status, PhaseStatus::Completed);
        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.insights.is_empty());
    }

    #[tokio::test]
    async fn overlapping_trigger_is_skipped() {
        let orchestrator = Orchestrator::new(Vec::new(), Arc::new(InMemoryGateway::new()));
        let _held = orchestrator.running.lock().await;
        assert!(orchestrator.try_run().await.is_none());
    }
}
