//! Run report export: JSON summary, markdown brief and Parquet snapshots with a digest manifest.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{Int64Array, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use intel_core::Priority;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::pipeline::{PhaseStatus, RunSummary};

#[derive(Debug, Clone, Serialize)]
pub struct ReportManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    root: PathBuf,
}

impl ReportWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write every report for `summary` under `<root>/<run_id>/` and return that directory.
    pub async fn write(&self, summary: &RunSummary) -> Result<PathBuf> {
        let run_dir = self.root.join(summary.run_id.to_string());
        let snapshot_dir = run_dir.join("snapshots");
        fs::create_dir_all(&snapshot_dir)
            .await
            .with_context(|| format!("creating {}", snapshot_dir.display()))?;

        let summary_path = run_dir.join("run_summary.json");
        let json = serde_json::to_vec_pretty(summary).context("serializing run summary")?;
        fs::write(&summary_path, json)
            .await
            .with_context(|| format!("writing {}", summary_path.display()))?;

        let brief_path = run_dir.join("executive_brief.md");
        fs::write(&brief_path, executive_brief(summary))
            .await
            .with_context(|| format!("writing {}", brief_path.display()))?;

        let phases_path = snapshot_dir.join("phases.parquet");
        let insights_path = snapshot_dir.join("insights.parquet");
        write_phases_parquet(&phases_path, summary)?;
        write_insights_parquet(&insights_path, summary)?;

        let manifest = ReportManifest {
            schema_version: 1,
            run_id: summary.run_id.to_string(),
            files: vec![
                manifest_entry("run_summary", &run_dir, &summary_path)?,
                manifest_entry("executive_brief", &run_dir, &brief_path)?,
                manifest_entry("phases", &run_dir, &phases_path)?,
                manifest_entry("insights", &run_dir, &insights_path)?,
            ],
        };
        let manifest_path = run_dir.join("manifest.json");
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing report manifest")?;
        fs::write(&manifest_path, bytes)
            .await
            .with_context(|| format!("writing {}", manifest_path.display()))?;

        Ok(run_dir)
    }
}

pub fn executive_brief(summary: &RunSummary) -> String {
    let mut out = format!(
        "# Competitive Intelligence Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n\
         - Status: {:?}\n- Records persisted: {}\n\n",
        summary.run_id,
        summary.started_at.to_rfc3339(),
        summary.finished_at.to_rfc3339(),
        summary.status,
        summary.total_persisted(),
    );

    out.push_str("## Recommended Actions\n");
    if summary.insights.is_empty() {
        out.push_str("- No thresholds crossed this run.\n");
    }
    for insight in &summary.insights {
        out.push_str(&format!(
            "- **{}** ({}): {}\n",
            insight.trigger.as_str(),
            insight.count,
            insight.recommended_action
        ));
    }

    out.push_str("\n## Phases\n| phase | status | in | out | persisted | critical | high |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    for phase in &summary.phases {
        let at = |p: Priority| phase.priority_counts.get(&p).copied().unwrap_or(0);
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            phase.name,
            phase.status.as_str(),
            phase.records_in,
            phase.records_out,
            phase.persisted,
            at(Priority::Critical),
            at(Priority::High),
        ));
    }

    let failed: Vec<_> = summary
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Failed)
        .collect();
    if !failed.is_empty() {
        out.push_str("\n## Failures\n");
        for phase in failed {
            out.push_str(&format!(
                "- {}: {}\n",
                phase.name,
                phase.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    out
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn write_phases_parquet(path: &Path, summary: &RunSummary) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("records_in", DataType::UInt64, false),
        Field::new("records_out", DataType::UInt64, false),
        Field::new("persisted", DataType::UInt64, false),
        Field::new("failures", DataType::UInt64, false),
        Field::new("error", DataType::Utf8, true),
        Field::new("duration_ms", DataType::Int64, true),
    ]));

    let phases = &summary.phases;
    let count = |f: fn(&crate::pipeline::PhaseResult) -> usize| {
        UInt64Array::from(phases.iter().map(|p| f(p) as u64).collect::<Vec<_>>())
    };
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(
                phases.iter().map(|p| Some(p.name.as_str())).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                phases.iter().map(|p| Some(p.category.as_str())).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                phases.iter().map(|p| Some(p.status.as_str())).collect::<Vec<_>>(),
            )),
            Arc::new(count(|p| p.records_in)),
            Arc::new(count(|p| p.records_out)),
            Arc::new(count(|p| p.persisted)),
            Arc::new(count(|p| p.failures.len())),
            Arc::new(StringArray::from(
                phases.iter().map(|p| p.error.as_deref()).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                phases.iter().map(|p| p.duration_ms).collect::<Vec<_>>(),
            )),
        ],
    )
    .context("building phases record batch")?;
    write_parquet(path, batch)
}

fn write_insights_parquet(path: &Path, summary: &RunSummary) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("trigger", DataType::Utf8, false),
        Field::new("count", DataType::UInt64, false),
        Field::new("recommended_action", DataType::Utf8, false),
    ]));
    let insights = &summary.insights;
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(
                insights.iter().map(|i| Some(i.trigger.as_str())).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                insights.iter().map(|i| i.count as u64).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                insights
                    .iter()
                    .map(|i| Some(i.recommended_action.as_str()))
                    .collect::<Vec<_>>(),
            )),
        ],
    )
    .context("building insights record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, run_dir: &Path, path: &Path) -> Result<ManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let rel = path.strip_prefix(run_dir).unwrap_or(path).display().to_string();
    Ok(ManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
    })
}
