//! The per-task run: assembly, execution, harvest, aggregation, commit.

use chrono::Utc;
use llm_eval_core::{
    ConfigSnapshot, CoreError, DatasetConfigId, EvalStore, EvaluationResult, EvaluationTask, Result,
    TaskId, TaskStatus,
};
use llm_eval_metrics::{CategoryAggregator, ScoreEntry, ScoreNormalizer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::assembler::{AssemblyInput, ConfigAssembler};
use crate::config::OrchestratorConfig;
use crate::device::DeviceProbe;
use crate::driver::ExecutionDriver;
use crate::harvester::{ResultHarvester, RowAttributor};

/// Progress after the workspace directory exists.
pub const WORKSPACE_READY_PROGRESS: u8 = 5;
/// Progress after the artifact is on disk.
pub const ARTIFACT_WRITTEN_PROGRESS: u8 = 10;
/// Progress after the engine exited cleanly.
pub const ENGINE_DONE_PROGRESS: u8 = 90;

/// Decodes the link snapshots of a task in link order.
pub async fn load_snapshots(store: &dyn EvalStore, task_id: TaskId) -> Result<Vec<ConfigSnapshot>> {
    store
        .task_links(task_id)
        .await?
        .iter()
        .map(|link| link.decode())
        .collect()
}

/// Executes one task end to end. Only the runner holding a task id moves
/// it out of `pending`.
pub struct TaskRunner {
    store: Arc<dyn EvalStore>,
    config: OrchestratorConfig,
    assembler: ConfigAssembler,
    driver: ExecutionDriver,
    probe: Arc<dyn DeviceProbe>,
    aggregator: CategoryAggregator,
}

impl TaskRunner {
    pub fn new(store: Arc<dyn EvalStore>, config: OrchestratorConfig, probe: Arc<dyn DeviceProbe>) -> Self {
        let normalizer = ScoreNormalizer::with_fragments(config.lower_is_better.iter().cloned());
        Self {
            assembler: ConfigAssembler::new(config.official_root.clone()),
            driver: ExecutionDriver::new(config.engine.clone()),
            aggregator: CategoryAggregator::new(normalizer),
            store,
            config,
            probe,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs a pending task and returns its final state. Errors of the run
    /// itself end up on the task; only store failures are returned.
    pub async fn run(&self, task_id: TaskId) -> Result<EvaluationTask> {
        let mut task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {} not found", task_id)))?;

        if task.status != TaskStatus::Pending {
            warn!(task_id = %task_id, status = %task.status, "Task is not pending, not running it");
            return Ok(task);
        }

        task.start()?;
        self.store.update_task(&task).await?;
        info!(task_id = %task_id, "Task started");

        match self.execute(&mut task).await {
            Ok(()) => {
                info!(
                    task_id = %task_id,
                    duration_seconds = ?task.duration_seconds(),
                    "Task succeeded"
                );
                Ok(task)
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Task failed");
                self.record_failure(task_id, e.to_string()).await
            }
        }
    }

    async fn record_failure(&self, task_id: TaskId, message: String) -> Result<EvaluationTask> {
        let mut task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {} not found", task_id)))?;
        if task.is_terminal() {
            warn!(task_id = %task_id, status = %task.status, "Task already terminal, failure not recorded");
            return Ok(task);
        }
        task.fail(message)?;
        match self.store.update_task(&task).await {
            Ok(()) => Ok(task),
            Err(CoreError::InvalidState(reason)) => {
                warn!(task_id = %task_id, reason = %reason, "Task finished concurrently, failure not recorded");
                self.store
                    .get_task(task_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("Task {} not found", task_id)))
            }
            Err(e) => Err(e),
        }
    }

    async fn advance(&self, task: &mut EvaluationTask, progress: u8) -> Result<()> {
        task.advance(progress)?;
        task.heartbeat()?;
        self.store.update_task(task).await
    }

    async fn execute(&self, task: &mut EvaluationTask) -> Result<()> {
        let snapshots = load_snapshots(self.store.as_ref(), task.id).await?;
        if snapshots.is_empty() {
            return Err(CoreError::Assembly(format!("task {} has no dataset snapshots", task.id)));
        }
        let model = self
            .store
            .get_model(task.model_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Model {} not found", task.model_id)))?;

        let workspace = self.config.task_workspace(task.id);
        tokio::fs::create_dir_all(&workspace).await?;
        self.advance(task, WORKSPACE_READY_PROGRESS).await?;

        let assembled = self.assembler.build(AssemblyInput {
            task_id: task.id,
            model: &model,
            datasets: &snapshots,
            device: self.probe.probe(),
            work_dir: &workspace,
        })?;
        let artifact = self.assembler.write(&assembled, &workspace).await?;
        self.advance(task, ARTIFACT_WRITTEN_PROGRESS).await?;

        self.run_engine(task.id, &artifact, &workspace).await?;
        self.advance(task, ENGINE_DONE_PROGRESS).await?;

        let harvester = ResultHarvester::new(assembled.model_abbr().map(str::to_string));
        let attributor = RowAttributor::new(assembled.abbr_map.clone(), &snapshots);
        let harvest = harvester.harvest(&workspace, &attributor)?;

        let categories: HashMap<DatasetConfigId, &str> = snapshots
            .iter()
            .map(|s| (s.config.id, s.category.as_str()))
            .collect();

        let mut entries = Vec::with_capacity(harvest.rows.len());
        let mut results = Vec::with_capacity(harvest.rows.len());
        for row in harvest.rows {
            let category = categories.get(&row.config_id).copied().unwrap_or_default();
            entries.push(ScoreEntry::new(&row.dataset, category, &row.metric, row.score));
            results.push(EvaluationResult::new(
                task.id,
                row.config_id,
                row.dataset,
                row.metric,
                row.score,
                row.raw_row,
            ));
        }

        info!(
            task_id = %task.id,
            tables = harvest.tables.len(),
            results = results.len(),
            "Harvested results"
        );

        task.succeed(self.aggregator.summarize(&entries))?;
        self.store.commit_success(task, &results).await
    }

    /// Runs the engine while refreshing the task heartbeat.
    async fn run_engine(&self, task_id: TaskId, artifact: &Path, workspace: &Path) -> Result<()> {
        let run = self.driver.run(artifact, workspace);
        tokio::pin!(run);

        let mut ticker = tokio::time::interval(self.config.heartbeat_interval());
        ticker.tick().await;

        loop {
            tokio::select! {
                result = &mut run => return result,
                _ = ticker.tick() => {
                    match self.store.touch_heartbeat(task_id, Utc::now()).await {
                        Ok(true) => {}
                        Ok(false) => warn!(task_id = %task_id, "Heartbeat rejected, task is no longer running"),
                        Err(e) => warn!(task_id = %task_id, error = %e, "Failed to record heartbeat"),
                    }
                }
            }
        }
    }
}
