//! Process-local store with the same semantics as [`crate::PgStore`].
//!
//! All state sits behind one lock, so every trait method is atomic with
//! respect to the others, matching the transactional behaviour of the
//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use llm_eval_core::*;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    models: HashMap<ModelId, ModelDescriptor>,
    metas: HashMap<DatasetMetaId, DatasetMeta>,
    configs: HashMap<DatasetConfigId, DatasetConfig>,
    schemes: HashMap<SchemeId, Scheme>,
    scheme_members: HashMap<SchemeId, Vec<DatasetConfigId>>,
    tasks: HashMap<TaskId, EvaluationTask>,
    links: HashMap<TaskId, Vec<TaskDatasetLink>>,
    results: HashMap<TaskId, Vec<EvaluationResult>>,
}

impl State {
    fn guarded_update(&mut self, task: &EvaluationTask) -> Result<()> {
        let stored = self
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", task.id)))?;
        if stored.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Task {} is already {}",
                task.id, stored.status
            )));
        }
        // Heartbeats written by touch_heartbeat must survive a stale local copy.
        let heartbeat_at = stored.heartbeat_at.max(task.heartbeat_at);
        *stored = task.clone();
        stored.heartbeat_at = heartbeat_at;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelStore for InMemoryStore {
    async fn insert_model(&self, model: &ModelDescriptor) -> Result<()> {
        self.state.write().await.models.insert(model.id, model.clone());
        Ok(())
    }

    async fn get_model(&self, id: ModelId) -> Result<Option<ModelDescriptor>> {
        Ok(self.state.read().await.models.get(&id).cloned())
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let state = self.state.read().await;
        let mut models: Vec<_> = state.models.values().cloned().collect();
        models.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(models)
    }
}

#[async_trait]
impl DatasetStore for InMemoryStore {
    async fn insert_meta(&self, meta: &DatasetMeta) -> Result<()> {
        self.state.write().await.metas.insert(meta.id, meta.clone());
        Ok(())
    }

    async fn get_meta(&self, id: DatasetMetaId) -> Result<Option<DatasetMeta>> {
        Ok(self.state.read().await.metas.get(&id).cloned())
    }

    async fn soft_delete_meta(&self, id: DatasetMetaId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.metas.get_mut(&id) {
            Some(meta) if !meta.deleted => {
                meta.deleted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_config(&self, config: &DatasetConfig) -> Result<()> {
        self.state.write().await.configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn update_config(&self, config: &DatasetConfig) -> Result<()> {
        let mut state = self.state.write().await;
        match state.configs.get_mut(&config.id) {
            Some(stored) => {
                *stored = config.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("Dataset config {}", config.id))),
        }
    }

    async fn get_config(&self, id: DatasetConfigId) -> Result<Option<DatasetConfig>> {
        Ok(self.state.read().await.configs.get(&id).cloned())
    }

    async fn get_configs(&self, ids: &[DatasetConfigId]) -> Result<Vec<DatasetConfig>> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| state.configs.get(id).cloned())
            .collect())
    }

    async fn configs_for_meta(&self, meta_id: DatasetMetaId) -> Result<Vec<DatasetConfig>> {
        let state = self.state.read().await;
        let mut configs: Vec<_> = state
            .configs
            .values()
            .filter(|c| c.meta_id == meta_id)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(configs)
    }
}

#[async_trait]
impl SchemeStore for InMemoryStore {
    async fn insert_scheme(&self, scheme: &Scheme) -> Result<()> {
        self.state.write().await.schemes.insert(scheme.id, scheme.clone());
        Ok(())
    }

    async fn get_scheme(&self, id: SchemeId) -> Result<Option<Scheme>> {
        Ok(self.state.read().await.schemes.get(&id).cloned())
    }

    async fn add_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.schemes.contains_key(&scheme_id) {
            return Err(CoreError::NotFound(format!("Scheme {}", scheme_id)));
        }
        let members = state.scheme_members.entry(scheme_id).or_default();
        if !members.contains(&config_id) {
            members.push(config_id);
        }
        Ok(())
    }

    async fn remove_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(members) = state.scheme_members.get_mut(&scheme_id) else {
            return Ok(false);
        };
        let before = members.len();
        members.retain(|id| *id != config_id);
        Ok(members.len() != before)
    }

    async fn scheme_config_ids(&self, scheme_id: SchemeId) -> Result<Vec<DatasetConfigId>> {
        let state = self.state.read().await;
        // Mirrors the cascading foreign key: members whose config is gone drop out.
        Ok(state
            .scheme_members
            .get(&scheme_id)
            .map(|ids| {
                ids.iter()
                    .filter(|id| state.configs.contains_key(id))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn create_task(&self, task: &EvaluationTask, links: &[TaskDatasetLink]) -> Result<()> {
        let mut state = self.state.write().await;
        if state.tasks.contains_key(&task.id) {
            return Err(CoreError::Database(format!("Task {} already exists", task.id)));
        }
        state.tasks.insert(task.id, task.clone());
        state.links.insert(task.id, links.to_vec());
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<EvaluationTask>> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<EvaluationTask>> {
        let state = self.state.read().await;
        let mut tasks: Vec<_> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<EvaluationTask>> {
        Ok(self
            .list_tasks()
            .await?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }

    async fn update_task(&self, task: &EvaluationTask) -> Result<()> {
        self.state.write().await.guarded_update(task)
    }

    async fn touch_heartbeat(&self, id: TaskId, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Running => {
                task.heartbeat_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn task_links(&self, id: TaskId) -> Result<Vec<TaskDatasetLink>> {
        Ok(self.state.read().await.links.get(&id).cloned().unwrap_or_default())
    }

    async fn commit_success(&self, task: &EvaluationTask, results: &[EvaluationResult]) -> Result<()> {
        if task.status != TaskStatus::Success {
            return Err(CoreError::InvalidState(format!(
                "Task {} is {}, only successful tasks carry results",
                task.id, task.status
            )));
        }
        let mut state = self.state.write().await;
        state.guarded_update(task)?;
        state.results.insert(task.id, results.to_vec());
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.results.remove(&id);
        state.links.remove(&id);
        Ok(state.tasks.remove(&id).is_some())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn results_for_task(&self, task_id: TaskId) -> Result<Vec<EvaluationResult>> {
        let state = self.state.read().await;
        let visible = state
            .tasks
            .get(&task_id)
            .map(|t| t.status == TaskStatus::Success)
            .unwrap_or(false);
        if !visible {
            return Ok(Vec::new());
        }
        Ok(state.results.get(&task_id).cloned().unwrap_or_default())
    }
}
