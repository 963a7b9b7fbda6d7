use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod context;
mod output;

use commands::{maintenance::MaintenanceCommand, tasks::TaskCommand};
use context::Context;
use output::OutputFormat;

const DEFAULT_FILTER: &str = "llm_eval_lab=info,llm_eval_workflow=info";

/// Orchestrates evaluation runs of language models and reports their scores.
#[derive(Debug, Parser)]
#[command(name = "llm-eval", version, about)]
pub struct Cli {
    /// Extra configuration file layered over config/default and config/local
    #[arg(short, long, global = true, env = "LLM_EVAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Tasks(TaskCommand),

    #[command(flatten)]
    Maintenance(MaintenanceCommand),
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let ctx = Context::new(&cli)?;
    tracing::debug!(workspace_root = %ctx.settings.orchestrator.workspace_root.display(), "settings loaded");

    match cli.command {
        Commands::Tasks(cmd) => commands::tasks::execute(&ctx, cmd).await,
        Commands::Maintenance(cmd) => commands::maintenance::execute(&ctx, cmd).await,
    }
}
