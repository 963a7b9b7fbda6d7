//! CLI execution context

use anyhow::{Context as _, Result};
use llm_eval_core::EvalStore;
use llm_eval_storage::{create_pool, PgStore};
use llm_eval_workflow::{Orchestrator, SystemDeviceProbe};
use std::sync::Arc;

use crate::config::Settings;
use crate::output::OutputWriter;
use crate::Cli;

pub struct Context {
    pub settings: Settings,
    pub output: OutputWriter,
}

impl Context {
    pub fn new(cli: &Cli) -> Result<Self> {
        let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
        Ok(Self {
            settings,
            output: OutputWriter::new(cli.output, cli.no_color),
        })
    }

    pub async fn connect(&self) -> Result<PgStore> {
        let pool = create_pool(&self.settings.postgres())
            .await
            .context("failed to connect to the database")?;
        Ok(PgStore::new(pool))
    }

    /// Connects and starts the in-process job queue.
    pub async fn orchestrator(&self) -> Result<Orchestrator> {
        let store: Arc<dyn EvalStore> = Arc::new(self.connect().await?);
        Ok(Orchestrator::start(
            store,
            self.settings.orchestrator.clone(),
            Arc::new(SystemDeviceProbe),
        ))
    }
}
