use async_trait::async_trait;
use chrono::{DateTime, Utc};
use llm_eval_core::{
    ContentHash, CoreError, DatasetConfigId, EvaluationResult, EvaluationTask, ModelId,
    ResultSummary, Result, SchemeId, TaskDatasetLink, TaskId, TaskStatus, TaskStore,
};
use sqlx::{postgres::PgRow, PgConnection, Row};
use uuid::Uuid;

use super::PgStore;

const TASK_COLUMNS: &str = "id, model_id, scheme_id, config_ids, status, progress, error_msg, \
     result_summary, created_at, started_at, finished_at, heartbeat_at";

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, task: &EvaluationTask, links: &[TaskDatasetLink]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO evaluation_tasks (
                id, model_id, scheme_id, config_ids, status, progress, error_msg,
                result_summary, created_at, started_at, finished_at, heartbeat_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(task.id.0)
        .bind(task.model_id.0)
        .bind(task.scheme_id.map(|id| id.0))
        .bind(serde_json::to_value(&task.config_ids)?)
        .bind(task.status.as_str())
        .bind(task.progress as i16)
        .bind(&task.error_msg)
        .bind(summary_to_json(task.summary.as_ref())?)
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(task.heartbeat_at)
        .execute(&mut *tx)
        .await?;

        for link in links {
            sqlx::query(
                r#"
                INSERT INTO task_dataset_links (task_id, config_id, snapshot, content_hash, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(link.task_id.0)
            .bind(link.dataset_config_id.0)
            .bind(&link.snapshot)
            .bind(link.content_hash.as_str())
            .bind(link.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<EvaluationTask>> {
        let row = sqlx::query(&format!("SELECT {} FROM evaluation_tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;

        row.map(row_to_task).transpose()
    }

    async fn list_tasks(&self) -> Result<Vec<EvaluationTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM evaluation_tasks ORDER BY created_at DESC",
            TASK_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(row_to_task).collect()
    }

    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<EvaluationTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM evaluation_tasks WHERE status = $1 ORDER BY created_at DESC",
            TASK_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(row_to_task).collect()
    }

    async fn update_task(&self, task: &EvaluationTask) -> Result<()> {
        let mut conn = self.pool().acquire().await?;
        guarded_update(&mut *conn, task).await
    }

    async fn touch_heartbeat(&self, id: TaskId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE evaluation_tasks SET heartbeat_at = $2 WHERE id = $1 AND status = 'running'",
        )
        .bind(id.0)
        .bind(at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn task_links(&self, id: TaskId) -> Result<Vec<TaskDatasetLink>> {
        let rows = sqlx::query(
            r#"
            SELECT task_id, config_id, snapshot, content_hash, created_at
            FROM task_dataset_links
            WHERE task_id = $1
            ORDER BY created_at, config_id
            "#,
        )
        .bind(id.0)
        .fetch_all(self.pool())
        .await?;

        let mut links = rows
            .into_iter()
            .map(row_to_link)
            .collect::<Result<Vec<_>>>()?;

        // Present links in the task's own config order.
        if let Some(task) = self.get_task(id).await? {
            links.sort_by_key(|link| {
                task.config_ids
                    .iter()
                    .position(|cid| *cid == link.dataset_config_id)
                    .unwrap_or(usize::MAX)
            });
        }
        Ok(links)
    }

    async fn commit_success(&self, task: &EvaluationTask, results: &[EvaluationResult]) -> Result<()> {
        if task.status != TaskStatus::Success {
            return Err(CoreError::InvalidState(format!(
                "Task {} is {}, only successful tasks carry results",
                task.id, task.status
            )));
        }

        let mut tx = self.pool().begin().await?;
        guarded_update(&mut *tx, task).await?;

        for result in results {
            sqlx::query(
                r#"
                INSERT INTO evaluation_results (
                    id, task_id, dataset_config_id, dataset_name, metric_name, score, raw_row, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(result.id.0)
            .bind(result.task_id.0)
            .bind(result.dataset_config_id.0)
            .bind(&result.dataset_name)
            .bind(&result.metric_name)
            .bind(result.score)
            .bind(&result.raw_row)
            .bind(result.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM evaluation_results WHERE task_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task_dataset_links WHERE task_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM evaluation_tasks WHERE id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }
}

/// Writes the mutable task columns unless the stored row is already terminal.
/// `heartbeat_at` only moves forward.
async fn guarded_update(conn: &mut PgConnection, task: &EvaluationTask) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE evaluation_tasks
        SET status = $2, progress = $3, error_msg = $4, result_summary = $5,
            started_at = $6, finished_at = $7, heartbeat_at = GREATEST(heartbeat_at, $8)
        WHERE id = $1 AND status NOT IN ('success', 'failed')
        "#,
    )
    .bind(task.id.0)
    .bind(task.status.as_str())
    .bind(task.progress as i16)
    .bind(&task.error_msg)
    .bind(summary_to_json(task.summary.as_ref())?)
    .bind(task.started_at)
    .bind(task.finished_at)
    .bind(task.heartbeat_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let stored: Option<String> = sqlx::query_scalar("SELECT status FROM evaluation_tasks WHERE id = $1")
        .bind(task.id.0)
        .fetch_optional(&mut *conn)
        .await?;

    match stored {
        Some(status) => Err(CoreError::InvalidState(format!(
            "Task {} is already {}",
            task.id, status
        ))),
        None => Err(CoreError::NotFound(format!("Task {}", task.id))),
    }
}

fn summary_to_json(summary: Option<&ResultSummary>) -> Result<Option<serde_json::Value>> {
    summary
        .map(serde_json::to_value)
        .transpose()
        .map_err(CoreError::from)
}

fn row_to_task(row: PgRow) -> Result<EvaluationTask> {
    let id: Uuid = row.try_get("id")?;
    let model_id: Uuid = row.try_get("model_id")?;
    let scheme_id: Option<Uuid> = row.try_get("scheme_id")?;
    let config_ids: serde_json::Value = row.try_get("config_ids")?;
    let status_str: String = row.try_get("status")?;
    let status = TaskStatus::parse(&status_str)
        .ok_or_else(|| CoreError::Database(format!("Unknown task status '{}'", status_str)))?;
    let progress: i16 = row.try_get("progress")?;
    let summary: Option<serde_json::Value> = row.try_get("result_summary")?;

    Ok(EvaluationTask {
        id: TaskId::from_uuid(id),
        model_id: ModelId::from_uuid(model_id),
        scheme_id: scheme_id.map(SchemeId::from_uuid),
        config_ids: serde_json::from_value::<Vec<DatasetConfigId>>(config_ids)?,
        status,
        progress: progress.clamp(0, 100) as u8,
        error_msg: row.try_get("error_msg")?,
        summary: summary.map(serde_json::from_value).transpose()?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        heartbeat_at: row.try_get("heartbeat_at")?,
    })
}

fn row_to_link(row: PgRow) -> Result<TaskDatasetLink> {
    let task_id: Uuid = row.try_get("task_id")?;
    let config_id: Uuid = row.try_get("config_id")?;
    let hash: String = row.try_get("content_hash")?;

    Ok(TaskDatasetLink {
        task_id: TaskId::from_uuid(task_id),
        dataset_config_id: DatasetConfigId::from_uuid(config_id),
        snapshot: row.try_get("snapshot")?,
        content_hash: ContentHash(hash),
        created_at: row.try_get("created_at")?,
    })
}
