#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use llm_eval_core::*;
use llm_eval_storage::InMemoryStore;
use llm_eval_workflow::{ConfigAssembler, OrchestratorConfig, Reconciler};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Records submissions instead of running them.
#[derive(Default)]
pub struct RecordingSubmitter {
    pub submitted: Mutex<Vec<TaskId>>,
}

#[async_trait]
impl JobSubmitter for RecordingSubmitter {
    async fn submit(&self, task_id: TaskId) -> Result<()> {
        self.submitted.lock().await.push(task_id);
        Ok(())
    }
}

pub fn private_config(meta: &DatasetMeta, name: &str) -> DatasetConfig {
    DatasetConfig::new(
        meta.id,
        name,
        TaskShape::FreeForm,
        ExecutionMode::Generative,
        FileReference::Path(format!("/data/{}.jsonl", name).into()),
    )
    .with_reader_shape(json!({"input_columns": ["question"], "output_column": "answer"}))
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub model: ModelDescriptor,
    pub metas: Vec<DatasetMeta>,
    pub configs: Vec<DatasetConfig>,
}

impl Fixture {
    /// A remote model plus one configuration per `(name, category)`.
    pub async fn new(datasets: &[(&str, &str)]) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let model = ModelDescriptor::remote(
            "demo-model",
            "gpt-4o-mini",
            Some("http://localhost:8000/v1".to_string()),
            Some("sk-test".to_string()),
        );
        store.insert_model(&model).await.unwrap();

        let mut metas = Vec::new();
        let mut configs = Vec::new();
        for (name, category) in datasets {
            let meta = DatasetMeta::new(*name, *category, Modality::Text);
            let config = private_config(&meta, &name.to_lowercase());
            store.insert_meta(&meta).await.unwrap();
            store.insert_config(&config).await.unwrap();
            metas.push(meta);
            configs.push(config);
        }

        Self {
            store,
            model,
            metas,
            configs,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn EvalStore> {
        self.store.clone()
    }

    pub fn config_ids(&self) -> Vec<DatasetConfigId> {
        self.configs.iter().map(|c| c.id).collect()
    }

    pub fn snapshots(&self) -> Vec<ConfigSnapshot> {
        self.configs
            .iter()
            .zip(&self.metas)
            .map(|(c, m)| ConfigSnapshot::capture(c, m))
            .collect()
    }

    pub async fn scheme_with_all(&self, name: &str) -> Scheme {
        let scheme = Scheme::new(name, None);
        self.store.insert_scheme(&scheme).await.unwrap();
        for config in &self.configs {
            self.store.add_scheme_config(scheme.id, config.id).await.unwrap();
        }
        scheme
    }

    /// Persists a pending task over every configuration.
    pub async fn pending_task(&self, scheme_id: Option<SchemeId>) -> EvaluationTask {
        let task = EvaluationTask::new(self.model.id, scheme_id, self.config_ids());
        let links: Vec<_> = self
            .snapshots()
            .iter()
            .map(|s| TaskDatasetLink::capture(task.id, s).unwrap())
            .collect();
        self.store.create_task(&task, &links).await.unwrap();
        task
    }
}

/// Summary table text with the model's score column last.
pub fn summary_csv(model: &str, rows: &[(&str, &str, &str)]) -> String {
    let mut out = format!("dataset,version,metric,mode,{}\n", model);
    for (dataset, metric, score) in rows {
        out.push_str(&format!("{},abc123,{},gen,{}\n", dataset, metric, score));
    }
    out
}

pub fn write_summary(workspace: &Path, run: &str, file: &str, body: &str) {
    let dir = workspace.join(run).join("summary");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), body).unwrap();
}

/// Configuration whose engine is a shell script. The script sees the
/// workspace as `$3`.
pub fn shell_engine(root: &Path, script: &str) -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_workspace_root(root.join("tasks"))
        .with_official_root(root.join("official"))
        .with_engine(
            "sh",
            vec!["-c".to_string(), script.to_string(), "engine".to_string()],
        )
}

/// Script writing a summary table for the given dataset keys.
pub fn reporting_script(model: &str, rows: &[(String, &str, &str)]) -> String {
    let rows: Vec<(&str, &str, &str)> = rows.iter().map(|(d, m, s)| (d.as_str(), *m, *s)).collect();
    let csv = summary_csv(model, &rows);
    format!(
        "mkdir -p \"$3/20240101_120000/summary\" && printf '%s' '{}' > \"$3/20240101_120000/summary/summary_20240101_120000.csv\" && echo evaluation finished",
        csv
    )
}

pub fn key(config: &DatasetConfig) -> String {
    ConfigAssembler::dataset_key(config)
}

/// Store that records the stored progress after every task write and runs a
/// reconciliation pass right after the progress 90 checkpoint lands.
pub struct CheckpointStore {
    inner: Arc<InMemoryStore>,
    reconciler: Reconciler,
    pub progress: Mutex<Vec<u8>>,
    pub reconciled: Mutex<Vec<TaskId>>,
}

impl CheckpointStore {
    pub fn new(inner: Arc<InMemoryStore>, stale_after: chrono::Duration) -> Self {
        Self {
            reconciler: Reconciler::new(inner.clone(), stale_after),
            inner,
            progress: Mutex::new(Vec::new()),
            reconciled: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, id: TaskId) -> Result<()> {
        if let Some(stored) = self.inner.get_task(id).await? {
            self.progress.lock().await.push(stored.progress);
        }
        Ok(())
    }
}

#[async_trait]
impl ModelStore for CheckpointStore {
    async fn insert_model(&self, model: &ModelDescriptor) -> Result<()> {
        self.inner.insert_model(model).await
    }
    async fn get_model(&self, id: ModelId) -> Result<Option<ModelDescriptor>> {
        self.inner.get_model(id).await
    }
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.inner.list_models().await
    }
}

#[async_trait]
impl DatasetStore for CheckpointStore {
    async fn insert_meta(&self, meta: &DatasetMeta) -> Result<()> {
        self.inner.insert_meta(meta).await
    }
    async fn get_meta(&self, id: DatasetMetaId) -> Result<Option<DatasetMeta>> {
        self.inner.get_meta(id).await
    }
    async fn soft_delete_meta(&self, id: DatasetMetaId) -> Result<bool> {
        self.inner.soft_delete_meta(id).await
    }
    async fn insert_config(&self, config: &DatasetConfig) -> Result<()> {
        self.inner.insert_config(config).await
    }
    async fn update_config(&self, config: &DatasetConfig) -> Result<()> {
        self.inner.update_config(config).await
    }
    async fn get_config(&self, id: DatasetConfigId) -> Result<Option<DatasetConfig>> {
        self.inner.get_config(id).await
    }
    async fn get_configs(&self, ids: &[DatasetConfigId]) -> Result<Vec<DatasetConfig>> {
        self.inner.get_configs(ids).await
    }
    async fn configs_for_meta(&self, meta_id: DatasetMetaId) -> Result<Vec<DatasetConfig>> {
        self.inner.configs_for_meta(meta_id).await
    }
}

#[async_trait]
impl SchemeStore for CheckpointStore {
    async fn insert_scheme(&self, scheme: &Scheme) -> Result<()> {
        self.inner.insert_scheme(scheme).await
    }
    async fn get_scheme(&self, id: SchemeId) -> Result<Option<Scheme>> {
        self.inner.get_scheme(id).await
    }
    async fn add_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<()> {
        self.inner.add_scheme_config(scheme_id, config_id).await
    }
    async fn remove_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<bool> {
        self.inner.remove_scheme_config(scheme_id, config_id).await
    }
    async fn scheme_config_ids(&self, scheme_id: SchemeId) -> Result<Vec<DatasetConfigId>> {
        self.inner.scheme_config_ids(scheme_id).await
    }
}

#[async_trait]
impl TaskStore for CheckpointStore {
    async fn create_task(&self, task: &EvaluationTask, links: &[TaskDatasetLink]) -> Result<()> {
        self.inner.create_task(task, links).await
    }
    async fn get_task(&self, id: TaskId) -> Result<Option<EvaluationTask>> {
        self.inner.get_task(id).await
    }
    async fn list_tasks(&self) -> Result<Vec<EvaluationTask>> {
        self.inner.list_tasks().await
    }
    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<EvaluationTask>> {
        self.inner.list_tasks_by_status(status).await
    }
    async fn update_task(&self, task: &EvaluationTask) -> Result<()> {
        self.inner.update_task(task).await?;
        self.record(task.id).await?;
        if task.status == TaskStatus::Running && task.progress == 90 {
            let failed = self.reconciler.reconcile_once(Utc::now()).await?;
            self.reconciled.lock().await.extend(failed);
        }
        Ok(())
    }
    async fn touch_heartbeat(&self, id: TaskId, at: DateTime<Utc>) -> Result<bool> {
        self.inner.touch_heartbeat(id, at).await
    }
    async fn task_links(&self, id: TaskId) -> Result<Vec<TaskDatasetLink>> {
        self.inner.task_links(id).await
    }
    async fn commit_success(&self, task: &EvaluationTask, results: &[EvaluationResult]) -> Result<()> {
        self.inner.commit_success(task, results).await?;
        self.record(task.id).await
    }
    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        self.inner.delete_task(id).await
    }
}

#[async_trait]
impl ResultStore for CheckpointStore {
    async fn results_for_task(&self, task_id: TaskId) -> Result<Vec<EvaluationResult>> {
        self.inner.results_for_task(task_id).await
    }
}
