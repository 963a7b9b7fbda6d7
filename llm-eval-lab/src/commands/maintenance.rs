//! Database and housekeeping commands

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use llm_eval_core::{DatasetMetaId, TaskId};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::context::Context;
use crate::output::OutputFormat;

#[derive(Debug, Subcommand)]
pub enum MaintenanceCommand {
    /// Apply pending database migrations
    Migrate,

    /// Fail running tasks whose heartbeat has gone stale
    Reconcile {
        /// Keep reconciling every SECONDS until interrupted
        #[arg(long, value_name = "SECONDS")]
        watch: Option<u64>,
    },

    /// Retire a dataset and delete the files of its private configurations
    Retire {
        meta_id: Uuid,
    },
}

pub async fn execute(ctx: &Context, cmd: MaintenanceCommand) -> Result<()> {
    match cmd {
        MaintenanceCommand::Migrate => migrate(ctx).await,
        MaintenanceCommand::Reconcile { watch } => reconcile(ctx, watch).await,
        MaintenanceCommand::Retire { meta_id } => retire(ctx, DatasetMetaId::from_uuid(meta_id)).await,
    }
}

async fn migrate(ctx: &Context) -> Result<()> {
    let store = ctx.connect().await?;
    llm_eval_storage::health_check(store.pool()).await?;
    llm_eval_storage::migrate(store.pool()).await?;
    ctx.output.success("Database migrations applied");
    Ok(())
}

async fn reconcile(ctx: &Context, watch: Option<u64>) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;

    let outcome = match watch {
        Some(seconds) => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });
            info!(every_secs = seconds, "watching for stale tasks");
            orchestrator
                .reconciler()
                .run(Duration::from_secs(seconds.max(1)), cancel)
                .await;
            Ok(())
        }
        None => match orchestrator.reconciler().reconcile_once(Utc::now()).await {
            Ok(failed) => report_reconciled(ctx, &failed),
            Err(err) => Err(err.into()),
        },
    };

    orchestrator.shutdown().await;
    outcome
}

fn report_reconciled(ctx: &Context, failed: &[TaskId]) -> Result<()> {
    if ctx.output.format() != OutputFormat::Table {
        println!("{}", serde_json::to_string_pretty(failed)?);
        return Ok(());
    }
    for id in failed {
        ctx.output.warning(&format!("Task {} marked failed", id));
    }
    ctx.output.success(&format!("{} stale task(s) reconciled", failed.len()));
    Ok(())
}

async fn retire(ctx: &Context, meta_id: DatasetMetaId) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;
    let outcome = orchestrator.retirer().retire(meta_id).await;
    orchestrator.shutdown().await;

    let report = outcome?;
    match ctx.output.format() {
        OutputFormat::Table => {
            for path in &report.removed_files {
                ctx.output.info(&format!("Removed {}", path.display()));
            }
            ctx.output.success(&format!("Retired dataset {}", meta_id));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
    }
    Ok(())
}
