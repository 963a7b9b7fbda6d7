use llm_eval_core::{CoreError, EvalStore, Result, TaskId, TaskStatus};
use llm_eval_metrics::{CategoryAggregator, Comparator, ComparedTask, ComparisonReport, ScoreEntry, ScoreNormalizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::runner::load_snapshots;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonView {
    pub scheme_name: String,
    #[serde(flatten)]
    pub report: ComparisonReport,
}

/// Loads completed tasks and lines them up against the first one.
pub struct ComparisonService {
    store: Arc<dyn EvalStore>,
    comparator: Comparator,
}

impl ComparisonService {
    pub fn new(store: Arc<dyn EvalStore>, lower_is_better: &[String]) -> Self {
        let normalizer = ScoreNormalizer::with_fragments(lower_is_better);
        Self {
            store,
            comparator: Comparator::new(CategoryAggregator::new(normalizer)),
        }
    }

    pub async fn compare(&self, task_ids: &[TaskId]) -> Result<ComparisonView> {
        if task_ids.len() < 2 {
            return Err(CoreError::IncomparableTasks(
                "at least two tasks are required".to_string(),
            ));
        }

        let mut compared = Vec::with_capacity(task_ids.len());
        for &task_id in task_ids {
            compared.push(self.load(task_id).await?);
        }

        let report = self.comparator.compare(&compared)?;
        let scheme_name = self
            .store
            .get_scheme(report.scheme_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_else(|| report.scheme_id.to_string());

        debug!(tasks = task_ids.len(), rows = report.rows.len(), "Compared tasks");
        Ok(ComparisonView { scheme_name, report })
    }

    async fn load(&self, task_id: TaskId) -> Result<ComparedTask> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::IncomparableTasks(format!("task {} does not exist", task_id)))?;
        if task.status != TaskStatus::Success {
            return Err(CoreError::IncomparableTasks(format!(
                "task {} is {}, only successful tasks can be compared",
                task_id, task.status
            )));
        }

        let model_name = self
            .store
            .get_model(task.model_id)
            .await?
            .map(|m| m.name)
            .unwrap_or_else(|| task.model_id.to_string());

        let categories: HashMap<_, _> = load_snapshots(self.store.as_ref(), task_id)
            .await?
            .into_iter()
            .map(|s| (s.config.id, s.category))
            .collect();

        let entries = self
            .store
            .results_for_task(task_id)
            .await?
            .into_iter()
            .map(|r| {
                let category = categories.get(&r.dataset_config_id).cloned().unwrap_or_default();
                ScoreEntry::new(r.dataset_name, category, r.metric_name, r.score)
            })
            .collect();

        Ok(ComparedTask {
            task_id,
            model_name,
            scheme_id: task.scheme_id,
            created_at: task.created_at,
            entries,
        })
    }
}
