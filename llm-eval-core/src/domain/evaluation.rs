use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DatasetConfigId, ResultId, TaskId};

/// One harvested score: a (task, dataset configuration, metric) row.
///
/// Rows are written once when a task succeeds and only removed together
/// with their task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub id: ResultId,
    pub task_id: TaskId,
    pub dataset_config_id: DatasetConfigId,
    pub dataset_name: String,
    pub metric_name: String,
    pub score: f64,
    /// The summary-table row the score came from, verbatim.
    pub raw_row: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn new(
        task_id: TaskId,
        dataset_config_id: DatasetConfigId,
        dataset_name: String,
        metric_name: String,
        score: f64,
        raw_row: serde_json::Value,
    ) -> Self {
        Self {
            id: ResultId::new(),
            task_id,
            dataset_config_id,
            dataset_name,
            metric_name,
            score,
            raw_row,
            created_at: Utc::now(),
        }
    }
}
