use async_trait::async_trait;
use llm_eval_core::{DatasetConfigId, EvaluationResult, Result, ResultId, ResultStore, TaskId};
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use super::PgStore;

#[async_trait]
impl ResultStore for PgStore {
    async fn results_for_task(&self, task_id: TaskId) -> Result<Vec<EvaluationResult>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.task_id, r.dataset_config_id, r.dataset_name, r.metric_name,
                   r.score, r.raw_row, r.created_at
            FROM evaluation_results r
            JOIN evaluation_tasks t ON t.id = r.task_id
            WHERE r.task_id = $1 AND t.status = 'success'
            ORDER BY r.created_at, r.id
            "#,
        )
        .bind(task_id.0)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(row_to_result).collect()
    }
}

fn row_to_result(row: PgRow) -> Result<EvaluationResult> {
    let id: Uuid = row.try_get("id")?;
    let task_id: Uuid = row.try_get("task_id")?;
    let config_id: Uuid = row.try_get("dataset_config_id")?;

    Ok(EvaluationResult {
        id: ResultId::from_uuid(id),
        task_id: TaskId::from_uuid(task_id),
        dataset_config_id: DatasetConfigId::from_uuid(config_id),
        dataset_name: row.try_get("dataset_name")?,
        metric_name: row.try_get("metric_name")?,
        score: row.try_get("score")?,
        raw_row: row.try_get("raw_row")?,
        created_at: row.try_get("created_at")?,
    })
}
