use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use speechflow::workflows::speech_scheduler;
use speechflow::{LoopbackSpeechClient, RunId, Settings, WorkflowId};

/// Speechflow - bounded-step workflows for speech synthesis and audio isolation
#[derive(Parser)]
#[command(name = "speechflow")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workflow run and wait for its result
    Schedule {
        /// Workflow to start (TextToSpeechWorkflow or AudioIsolationWorkflow)
        workflow: String,

        /// Explicit run identity (default: generated)
        #[arg(long)]
        run_id: Option<String>,

        /// Lookup interval while the run is not registered yet
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Log the registered workflows and functions, then idle until Ctrl-C
    ///
    /// Runs live in process memory, so other processes cannot schedule into
    /// this one; the pruner only tidies runs started inside it.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid environment configuration")?;

    match cli.command {
        Commands::Schedule {
            workflow,
            run_id,
            poll_interval_ms,
        } => {
            schedule(
                &settings,
                WorkflowId::new(workflow),
                run_id.map(RunId::new),
                poll_interval_ms.map(Duration::from_millis),
            )
            .await
        }
        Commands::Serve => serve(&settings).await,
    }
}

async fn schedule(
    settings: &Settings,
    workflow_id: WorkflowId,
    run_id: Option<RunId>,
    poll_interval: Option<Duration>,
) -> Result<()> {
    let scheduler = speech_scheduler(settings, Arc::new(LoopbackSpeechClient))
        .context("failed to build scheduler")?;

    let run_id = scheduler
        .schedule_workflow(&workflow_id, run_id)
        .with_context(|| format!("failed to schedule {workflow_id}"))?;
    eprintln!("Scheduled run: {run_id}");

    let run = scheduler
        .waiter()
        .with_grace(settings.result_grace)
        .with_poll_interval(settings.poll_interval)
        .await_run(&workflow_id, &run_id, poll_interval)
        .await
        .context("failed to wait for run")?;

    for record in run.steps() {
        eprintln!(
            "Step {} finished in {:?}{}",
            record.step_name,
            record.elapsed,
            record
                .error
                .map(|kind| format!(" ({kind})"))
                .unwrap_or_default()
        );
    }

    match run.result() {
        Some(Ok(output)) => {
            println!("{}", serde_json::to_string_pretty(output.as_map())?);
            Ok(())
        }
        Some(Err(e)) => bail!("run {run_id} failed: {}: {}", e.kind(), e.message()),
        None => bail!("run {run_id} finished without a result"),
    }
}

async fn serve(settings: &Settings) -> Result<()> {
    let scheduler = speech_scheduler(settings, Arc::new(LoopbackSpeechClient))
        .context("failed to build scheduler")?;

    for workflow_id in scheduler.workflow_ids() {
        info!("Registered workflow: {}", workflow_id);
    }
    for name in scheduler.executor().function_names() {
        info!("Registered function: {}", name);
    }

    let prune_every = settings.retention.min(Duration::from_secs(60));
    let pruner = scheduler
        .spawn_pruner(prune_every, settings.retention)
        .context("failed to start pruner")?;
    info!("Scheduler ready, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    pruner.abort();
    info!("Shutting down");
    Ok(())
}
