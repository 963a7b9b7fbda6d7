use llm_eval_core::{EvalStore, JobSubmitter};
use std::sync::Arc;

use crate::compare::ComparisonService;
use crate::config::OrchestratorConfig;
use crate::device::DeviceProbe;
use crate::export::SummaryExporter;
use crate::manager::TaskManager;
use crate::queue::TaskQueue;
use crate::reconciler::Reconciler;
use crate::retire::DatasetRetirer;
use crate::runner::TaskRunner;
use crate::tailer::LogTailer;

/// Wires the services over one store and one configuration.
pub struct Orchestrator {
    config: OrchestratorConfig,
    queue: Arc<TaskQueue>,
    manager: TaskManager,
    comparison: ComparisonService,
    tailer: LogTailer,
    exporter: SummaryExporter,
    reconciler: Reconciler,
    retirer: DatasetRetirer,
}

impl Orchestrator {
    /// Starts the job queue. Must be called inside a tokio runtime.
    pub fn start(store: Arc<dyn EvalStore>, config: OrchestratorConfig, probe: Arc<dyn DeviceProbe>) -> Self {
        let runner = Arc::new(TaskRunner::new(store.clone(), config.clone(), probe));
        let queue = Arc::new(TaskQueue::start(runner, config.max_concurrent_tasks));
        let submitter: Arc<dyn JobSubmitter> = queue.clone();

        Self {
            manager: TaskManager::new(store.clone(), submitter)
                .with_workspace_cleanup(config.workspace_root.clone()),
            comparison: ComparisonService::new(store.clone(), &config.lower_is_better),
            tailer: LogTailer::new(store.clone(), config.log_tail.clone()),
            exporter: SummaryExporter::new(store.clone(), config.clone()),
            reconciler: Reconciler::new(store.clone(), config.stale_after()),
            retirer: DatasetRetirer::new(store),
            queue,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.manager
    }

    pub fn comparison(&self) -> &ComparisonService {
        &self.comparison
    }

    pub fn logs(&self) -> &LogTailer {
        &self.tailer
    }

    pub fn exporter(&self) -> &SummaryExporter {
        &self.exporter
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn retirer(&self) -> &DatasetRetirer {
        &self.retirer
    }

    /// Stops taking queued work and waits for running tasks.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
