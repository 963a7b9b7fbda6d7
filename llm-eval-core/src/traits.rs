use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::*;
use crate::error::Result;

#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn insert_model(&self, model: &ModelDescriptor) -> Result<()>;
    async fn get_model(&self, id: ModelId) -> Result<Option<ModelDescriptor>>;
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>>;
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn insert_meta(&self, meta: &DatasetMeta) -> Result<()>;
    async fn get_meta(&self, id: DatasetMetaId) -> Result<Option<DatasetMeta>>;
    /// Flags the meta as deleted. The row stays so past snapshots keep resolving.
    async fn soft_delete_meta(&self, id: DatasetMetaId) -> Result<bool>;

    async fn insert_config(&self, config: &DatasetConfig) -> Result<()>;
    async fn update_config(&self, config: &DatasetConfig) -> Result<()>;
    async fn get_config(&self, id: DatasetConfigId) -> Result<Option<DatasetConfig>>;
    /// Loads the distinct configurations among `ids` that exist, in request order.
    async fn get_configs(&self, ids: &[DatasetConfigId]) -> Result<Vec<DatasetConfig>>;
    async fn configs_for_meta(&self, meta_id: DatasetMetaId) -> Result<Vec<DatasetConfig>>;
}

#[async_trait]
pub trait SchemeStore: Send + Sync {
    async fn insert_scheme(&self, scheme: &Scheme) -> Result<()>;
    async fn get_scheme(&self, id: SchemeId) -> Result<Option<Scheme>>;
    async fn add_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<()>;
    async fn remove_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<bool>;
    /// Current members in the order they were added.
    async fn scheme_config_ids(&self, scheme_id: SchemeId) -> Result<Vec<DatasetConfigId>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new task together with its link snapshots, all or nothing.
    async fn create_task(&self, task: &EvaluationTask, links: &[TaskDatasetLink]) -> Result<()>;
    async fn get_task(&self, id: TaskId) -> Result<Option<EvaluationTask>>;
    /// All tasks, newest first.
    async fn list_tasks(&self) -> Result<Vec<EvaluationTask>>;
    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<EvaluationTask>>;
    /// Overwrites the stored task, keeping the later of the stored and given
    /// `heartbeat_at`. Fails with `InvalidState` once the stored copy is terminal.
    async fn update_task(&self, task: &EvaluationTask) -> Result<()>;
    /// Refreshes the liveness timestamp of a running task. Returns false when
    /// the task is missing or no longer running.
    async fn touch_heartbeat(&self, id: TaskId, at: DateTime<Utc>) -> Result<bool>;
    async fn task_links(&self, id: TaskId) -> Result<Vec<TaskDatasetLink>>;
    /// Writes the successful task and its results in one step.
    async fn commit_success(&self, task: &EvaluationTask, results: &[EvaluationResult]) -> Result<()>;
    /// Removes results, links and the task row. Returns false if the task did not exist.
    async fn delete_task(&self, id: TaskId) -> Result<bool>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn results_for_task(&self, task_id: TaskId) -> Result<Vec<EvaluationResult>>;
}

/// Everything the orchestration services need from persistence.
pub trait EvalStore: ModelStore + DatasetStore + SchemeStore + TaskStore + ResultStore {}

impl<T> EvalStore for T where T: ModelStore + DatasetStore + SchemeStore + TaskStore + ResultStore {}

/// Hands a persisted task to the asynchronous run machinery.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, task_id: TaskId) -> Result<()>;
}
