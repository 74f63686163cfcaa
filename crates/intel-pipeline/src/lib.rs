//! Pipeline assembly: configuration, normalization, dedup, scoring, orchestration and reports.

use std::sync::Arc;

use anyhow::{Context, Result};
use intel_adapters::{build_adapter, Credentials};
use intel_storage::{HttpFetcher, InMemoryGateway, PersistenceGateway, PgGateway, RestGateway};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod config;
pub mod dedup;
pub mod insights;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod terms;

pub use config::{
    ConfigError, HttpSettings, InsightThresholds, PhaseConfig, PipelineConfig, StoreTarget,
    WatchLists,
};
pub use dedup::Deduplicator;
pub use insights::{Insight, InsightTrigger, RunCounts};
pub use normalize::normalize;
pub use pipeline::{
    Orchestrator, Phase, PhaseResult, PhaseStatus, RecordFailure, RunStatus, RunSummary,
};
pub use report::ReportWriter;
pub use score::Scorer;

pub const CRATE_NAME: &str = "intel-pipeline";

/// Connect to the selected store and verify it answers before any phase runs.
pub async fn open_store(target: &StoreTarget) -> Result<Arc<dyn PersistenceGateway>> {
    let gateway: Arc<dyn PersistenceGateway> = match target {
        StoreTarget::Postgres { url } => {
            let pg = PgGateway::connect(url).await.context("connecting to postgres")?;
            pg.migrate().await.context("migrating store schema")?;
            Arc::new(pg)
        }
        StoreTarget::Rest { url, key } => Arc::new(
            RestGateway::new(url.clone(), key.clone(), std::time::Duration::from_secs(20))
                .context("building REST store client")?,
        ),
        StoreTarget::Memory => Arc::new(InMemoryGateway::new()),
    };
    gateway
        .ping()
        .await
        .with_context(|| format!("{} store is not reachable", gateway.name()))?;
    info!(store = gateway.name(), "store ready");
    Ok(gateway)
}

/// Turn the configured phases into runnable adapters sharing one HTTP fetcher.
pub fn build_orchestrator(
    config: &PipelineConfig,
    gateway: Arc<dyn PersistenceGateway>,
    credentials: &Credentials,
    cancel: CancellationToken,
) -> Result<Orchestrator> {
    let http = Arc::new(HttpFetcher::new(config.http.client_config())?);

    let mut phases = Vec::new();
    for phase in config.enabled_phases() {
        let adapters = phase
            .adapters
            .iter()
            .map(|adapter| build_adapter(adapter, phase.category, http.clone(), credentials))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("building adapters for phase {}", phase.display_name()))?;
        phases.push(Phase::new(phase.display_name(), phase.category, adapters));
    }

    Ok(Orchestrator::new(phases, gateway)
        .with_scorer(Scorer::new(config.watch_lists.clone()))
        .with_dedup(Deduplicator::new(config.merge_policy))
        .with_thresholds(config.insights)
        .with_cancellation(cancel))
}

/// Run once and export reports when a writer is given. Report failures are logged only.
pub async fn run_and_report(
    orchestrator: &Orchestrator,
    reports: Option<&ReportWriter>,
) -> RunSummary {
    let summary = orchestrator.run().await;
    write_reports(&summary, reports).await;
    summary
}

async fn write_reports(summary: &RunSummary, reports: Option<&ReportWriter>) {
    let Some(writer) = reports else {
        return;
    };
    match writer.write(summary).await {
        Ok(dir) => info!(dir = %dir.display(), "run reports written"),
        Err(err) => warn!(error = %format!("{err:#}"), "writing run reports failed"),
    }
}

/// Cron-driven runner. Triggers that fire while a run is in progress are skipped.
pub async fn build_scheduler(
    cron: &str,
    orchestrator: Arc<Orchestrator>,
    reports: Option<ReportWriter>,
) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let reports = reports.map(Arc::new);
    let job = Job::new_async(cron, move |_uuid, _l| {
        let orchestrator = orchestrator.clone();
        let reports = reports.clone();
        Box::pin(async move {
            if let Some(summary) = orchestrator.try_run().await {
                write_reports(&summary, reports.as_deref()).await;
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(sched)
}
