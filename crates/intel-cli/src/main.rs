use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use intel_adapters::Credentials;
use intel_pipeline::{
    build_orchestrator, build_scheduler, open_store, run_and_report, PipelineConfig, ReportWriter,
    RunSummary, StoreTarget,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "intel")]
#[command(about = "Competitive intelligence collection pipeline")]
struct Cli {
    /// Pipeline config file; defaults to $INTEL_CONFIG or ./intel.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every enabled phase once.
    Run(RunArgs),
    /// Run on a cron schedule until interrupted.
    Schedule {
        #[command(flatten)]
        run: RunArgs,
        /// Overrides the schedule from the config file.
        #[arg(long)]
        cron: Option<String>,
    },
    /// Verify the configured store answers.
    CheckStore,
    /// List the configured phases and their adapters.
    Phases,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Keep records in memory instead of writing to a store.
    #[arg(long)]
    dry_run: bool,
    /// Skip writing run reports.
    #[arg(long)]
    no_report: bool,
    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("intel=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current phase");
            token.cancel();
        }
    });
    cancel
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("serializing run summary")?
        );
        return Ok(());
    }
    println!(
        "run complete: run_id={} status={:?} persisted={} failed_phases={} insights={}",
        summary.run_id,
        summary.status,
        summary.total_persisted(),
        summary.counts.failed_phases,
        summary.insights.len()
    );
    for phase in &summary.phases {
        println!(
            "  {:<20} {:<10} in={} out={} persisted={} failures={}",
            phase.name,
            phase.status.as_str(),
            phase.records_in,
            phase.records_out,
            phase.persisted,
            phase.failures.len()
        );
    }
    for insight in &summary.insights {
        println!(
            "  ! {} ({}): {}",
            insight.trigger.as_str(),
            insight.count,
            insight.recommended_action
        );
    }
    Ok(())
}

async fn prepare(
    config: &PipelineConfig,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<(intel_pipeline::Orchestrator, Option<ReportWriter>)> {
    let target = StoreTarget::from_env(args.dry_run)?;
    info!(store = target.describe(), dry_run = args.dry_run, "selected store");
    let gateway = open_store(&target).await?;
    let orchestrator = build_orchestrator(config, gateway, &Credentials::from_env(), cancel)?;
    let reports = (!args.no_report).then(|| ReportWriter::new(config.reports_dir.clone()));
    Ok((orchestrator, reports))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let config_path = cli.config.unwrap_or_else(PipelineConfig::path_from_env);
    let config = PipelineConfig::load(&config_path)
        .with_context(|| format!("loading pipeline config {}", config_path.display()))?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let (orchestrator, reports) = prepare(&config, &args, cancel_on_ctrl_c()).await?;
            let summary = run_and_report(&orchestrator, reports.as_ref()).await;
            print_summary(&summary, args.json)?;
        }
        Commands::Schedule { run, cron } => {
            let cron = cron.unwrap_or_else(|| config.schedule.clone());
            let cancel = cancel_on_ctrl_c();
            let (orchestrator, reports) = prepare(&config, &run, cancel.clone()).await?;
            let mut sched = build_scheduler(&cron, Arc::new(orchestrator), reports).await?;
            sched.start().await.context("starting scheduler")?;
            info!(cron = cron.as_str(), "scheduler running; press Ctrl-C to stop");
            cancel.cancelled().await;
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::CheckStore => {
            let target = StoreTarget::from_env(false)?;
            let gateway = open_store(&target).await?;
            println!("store ok: {}", gateway.name());
        }
        Commands::Phases => {
            for phase in &config.phases {
                let kinds: Vec<_> = phase.adapters.iter().map(|a| a.kind()).collect();
                println!(
                    "{:<20} {:<16} enabled={} adapters={}",
                    phase.display_name(),
                    phase.category.as_str(),
                    phase.enabled,
                    kinds.join(",")
                );
            }
        }
    }

    Ok(())
}
