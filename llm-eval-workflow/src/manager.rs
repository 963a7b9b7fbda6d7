//! Task Record Manager: validated task creation, lookup and deletion.

use llm_eval_core::{
    ConfigSnapshot, CoreError, DatasetConfigId, EvalStore, EvaluationResult, EvaluationTask,
    JobSubmitter, ModelId, Result, SchemeId, TaskDatasetLink, TaskId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::runner::load_snapshots;
use crate::scheme::SchemeResolver;

/// What a task will evaluate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    pub model_id: Option<ModelId>,
    /// When set, replaces `config_ids` with the scheme's current members.
    pub scheme_id: Option<SchemeId>,
    #[serde(default)]
    pub config_ids: Vec<DatasetConfigId>,
}

/// A task with everything a detail view shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task: EvaluationTask,
    pub model_name: Option<String>,
    pub datasets: Vec<ConfigSnapshot>,
    pub results: Vec<EvaluationResult>,
}

pub struct TaskManager {
    store: Arc<dyn EvalStore>,
    resolver: SchemeResolver,
    submitter: Arc<dyn JobSubmitter>,
    workspace_root: Option<PathBuf>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn EvalStore>, submitter: Arc<dyn JobSubmitter>) -> Self {
        Self {
            resolver: SchemeResolver::new(store.clone()),
            store,
            submitter,
            workspace_root: None,
        }
    }

    /// Also remove `<root>/task_<id>` when a task is deleted.
    pub fn with_workspace_cleanup(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub async fn create(&self, request: TaskRequest) -> Result<EvaluationTask> {
        let model_id = request
            .model_id
            .ok_or_else(|| CoreError::Validation("model_id is required".to_string()))?;
        if self.store.get_model(model_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Model {} not found", model_id)));
        }

        let ids: Vec<DatasetConfigId> = match request.scheme_id {
            Some(scheme_id) => match self.resolver.resolve(scheme_id).await {
                Ok(configs) => configs.into_iter().map(|c| c.id).collect(),
                Err(CoreError::EmptySelection(_)) => Vec::new(),
                Err(e) => return Err(e),
            },
            None => request.config_ids,
        };
        if ids.is_empty() {
            return Err(CoreError::NoDatasetsSelected);
        }

        let configs = self.store.get_configs(&ids).await?;
        let mut snapshots = Vec::with_capacity(configs.len());
        for config in &configs {
            match self.store.get_meta(config.meta_id).await? {
                Some(meta) if !meta.deleted => snapshots.push(ConfigSnapshot::capture(config, &meta)),
                _ => warn!(config_id = %config.id, "Configuration belongs to a retired dataset"),
            }
        }

        let distinct: HashSet<&DatasetConfigId> = ids.iter().collect();
        if snapshots.len() != ids.len() || distinct.len() != ids.len() {
            return Err(CoreError::PartialOrDuplicateSelection {
                requested: ids.len(),
                found: snapshots.len(),
            });
        }

        let task = EvaluationTask::new(model_id, request.scheme_id, ids);
        let links = snapshots
            .iter()
            .map(|s| TaskDatasetLink::capture(task.id, s))
            .collect::<Result<Vec<_>>>()?;
        self.store.create_task(&task, &links).await?;
        info!(
            task_id = %task.id,
            model_id = %model_id,
            scheme_id = ?request.scheme_id,
            datasets = links.len(),
            "Task created"
        );

        if let Err(e) = self.submitter.submit(task.id).await {
            error!(task_id = %task.id, error = %e, "Failed to enqueue task");
            return Err(e);
        }
        Ok(task)
    }

    pub async fn get(&self, task_id: TaskId) -> Result<EvaluationTask> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {} not found", task_id)))
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> Result<Vec<EvaluationTask>> {
        self.store.list_tasks().await
    }

    /// Result rows of a task. Empty until the task has succeeded.
    pub async fn results(&self, task_id: TaskId) -> Result<Vec<EvaluationResult>> {
        self.get(task_id).await?;
        self.store.results_for_task(task_id).await
    }

    pub async fn detail(&self, task_id: TaskId) -> Result<TaskDetail> {
        let task = self.get(task_id).await?;
        let model_name = self.store.get_model(task.model_id).await?.map(|m| m.name);
        let datasets = load_snapshots(self.store.as_ref(), task_id).await?;
        let results = self.store.results_for_task(task_id).await?;
        Ok(TaskDetail {
            task,
            model_name,
            datasets,
            results,
        })
    }

    /// Deletes a task with its results and links. Returns false when the
    /// task does not exist.
    pub async fn delete(&self, task_id: TaskId) -> Result<bool> {
        if !self.store.delete_task(task_id).await? {
            return Ok(false);
        }
        info!(task_id = %task_id, "Task deleted");

        if let Some(root) = &self.workspace_root {
            let workspace = root.join(format!("task_{}", task_id));
            match tokio::fs::remove_dir_all(&workspace).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %workspace.display(), error = %e, "Failed to remove task workspace"),
            }
        }
        Ok(true)
    }
}
