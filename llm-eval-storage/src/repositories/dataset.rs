use async_trait::async_trait;
use llm_eval_core::{
    CoreError, DatasetConfig, DatasetConfigId, DatasetMeta, DatasetMetaId, DatasetStore,
    ExecutionMode, FileReference, Modality, Result, TaskShape,
};
use sqlx::{postgres::PgRow, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::PgStore;

const CONFIG_COLUMNS: &str = "id, meta_id, name, task_shape, mode, file_ref, display_metric, \
     reader_shape, infer_shape, metric_shape, postprocess_shape, fewshot_shape, created_at";

#[async_trait]
impl DatasetStore for PgStore {
    async fn insert_meta(&self, meta: &DatasetMeta) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dataset_metas (id, name, category, modality, record_count, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(meta.id.0)
        .bind(&meta.name)
        .bind(&meta.category)
        .bind(modality_to_str(meta.modality))
        .bind(meta.record_count)
        .bind(meta.deleted)
        .bind(meta.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get_meta(&self, id: DatasetMetaId) -> Result<Option<DatasetMeta>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, category, modality, record_count, deleted, created_at
            FROM dataset_metas
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.map(row_to_meta).transpose()
    }

    async fn soft_delete_meta(&self, id: DatasetMetaId) -> Result<bool> {
        let result = sqlx::query("UPDATE dataset_metas SET deleted = TRUE WHERE id = $1 AND NOT deleted")
            .bind(id.0)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_config(&self, config: &DatasetConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dataset_configs (
                id, meta_id, name, task_shape, mode, file_ref, display_metric,
                reader_shape, infer_shape, metric_shape, postprocess_shape, fewshot_shape,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(config.id.0)
        .bind(config.meta_id.0)
        .bind(&config.name)
        .bind(shape_to_str(config.task_shape))
        .bind(mode_to_str(config.mode))
        .bind(config.file_ref.to_string())
        .bind(&config.display_metric)
        .bind(&config.reader_shape)
        .bind(&config.infer_shape)
        .bind(&config.metric_shape)
        .bind(&config.postprocess_shape)
        .bind(&config.fewshot_shape)
        .bind(config.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn update_config(&self, config: &DatasetConfig) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE dataset_configs
            SET name = $2, task_shape = $3, mode = $4, file_ref = $5, display_metric = $6,
                reader_shape = $7, infer_shape = $8, metric_shape = $9,
                postprocess_shape = $10, fewshot_shape = $11
            WHERE id = $1
            "#,
        )
        .bind(config.id.0)
        .bind(&config.name)
        .bind(shape_to_str(config.task_shape))
        .bind(mode_to_str(config.mode))
        .bind(config.file_ref.to_string())
        .bind(&config.display_metric)
        .bind(&config.reader_shape)
        .bind(&config.infer_shape)
        .bind(&config.metric_shape)
        .bind(&config.postprocess_shape)
        .bind(&config.fewshot_shape)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Dataset config {}", config.id)));
        }
        Ok(())
    }

    async fn get_config(&self, id: DatasetConfigId) -> Result<Option<DatasetConfig>> {
        let row = sqlx::query(&format!("SELECT {} FROM dataset_configs WHERE id = $1", CONFIG_COLUMNS))
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;

        row.map(row_to_config).transpose()
    }

    async fn get_configs(&self, ids: &[DatasetConfigId]) -> Result<Vec<DatasetConfig>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(&format!("SELECT {} FROM dataset_configs WHERE id = ANY($1)", CONFIG_COLUMNS))
            .bind(&uuids)
            .fetch_all(self.pool())
            .await?;

        let mut by_id: HashMap<DatasetConfigId, DatasetConfig> = rows
            .into_iter()
            .map(|row| row_to_config(row).map(|c| (c.id, c)))
            .collect::<Result<_>>()?;

        // Request order; `remove` drops repeated ids.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn configs_for_meta(&self, meta_id: DatasetMetaId) -> Result<Vec<DatasetConfig>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM dataset_configs WHERE meta_id = $1 ORDER BY created_at",
            CONFIG_COLUMNS
        ))
        .bind(meta_id.0)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(row_to_config).collect()
    }
}

// Helper functions
fn modality_to_str(modality: Modality) -> &'static str {
    match modality {
        Modality::Text => "text",
        Modality::Image => "image",
        Modality::Video => "video",
        Modality::Audio => "audio",
    }
}

fn str_to_modality(s: &str) -> Result<Modality> {
    match s {
        "text" => Ok(Modality::Text),
        "image" => Ok(Modality::Image),
        "video" => Ok(Modality::Video),
        "audio" => Ok(Modality::Audio),
        other => Err(CoreError::Database(format!("Unknown modality '{}'", other))),
    }
}

fn shape_to_str(shape: TaskShape) -> &'static str {
    match shape {
        TaskShape::MultipleChoice => "multiple-choice",
        TaskShape::Cloze => "cloze",
        TaskShape::FreeForm => "free-form",
    }
}

fn str_to_shape(s: &str) -> Result<TaskShape> {
    match s {
        "multiple-choice" => Ok(TaskShape::MultipleChoice),
        "cloze" => Ok(TaskShape::Cloze),
        "free-form" => Ok(TaskShape::FreeForm),
        other => Err(CoreError::Database(format!("Unknown task shape '{}'", other))),
    }
}

fn mode_to_str(mode: ExecutionMode) -> &'static str {
    match mode {
        ExecutionMode::Generative => "generative",
        ExecutionMode::Perplexity => "perplexity",
        ExecutionMode::Mixed => "mixed",
    }
}

fn str_to_mode(s: &str) -> Result<ExecutionMode> {
    match s {
        "generative" => Ok(ExecutionMode::Generative),
        "perplexity" => Ok(ExecutionMode::Perplexity),
        "mixed" => Ok(ExecutionMode::Mixed),
        other => Err(CoreError::Database(format!("Unknown execution mode '{}'", other))),
    }
}

fn row_to_meta(row: PgRow) -> Result<DatasetMeta> {
    let id: Uuid = row.try_get("id")?;
    let modality: String = row.try_get("modality")?;

    Ok(DatasetMeta {
        id: DatasetMetaId::from_uuid(id),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        modality: str_to_modality(&modality)?,
        record_count: row.try_get("record_count")?,
        deleted: row.try_get("deleted")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_config(row: PgRow) -> Result<DatasetConfig> {
    let id: Uuid = row.try_get("id")?;
    let meta_id: Uuid = row.try_get("meta_id")?;
    let task_shape: String = row.try_get("task_shape")?;
    let mode: String = row.try_get("mode")?;
    let file_ref: String = row.try_get("file_ref")?;

    Ok(DatasetConfig {
        id: DatasetConfigId::from_uuid(id),
        meta_id: DatasetMetaId::from_uuid(meta_id),
        name: row.try_get("name")?,
        task_shape: str_to_shape(&task_shape)?,
        mode: str_to_mode(&mode)?,
        file_ref: FileReference::parse(&file_ref).map_err(CoreError::Database)?,
        display_metric: row.try_get("display_metric")?,
        reader_shape: row.try_get("reader_shape")?,
        infer_shape: row.try_get("infer_shape")?,
        metric_shape: row.try_get("metric_shape")?,
        postprocess_shape: row.try_get("postprocess_shape")?,
        fewshot_shape: row.try_get("fewshot_shape")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_columns_round_trip() {
        for modality in [Modality::Text, Modality::Image, Modality::Video, Modality::Audio] {
            assert_eq!(str_to_modality(modality_to_str(modality)).unwrap(), modality);
        }
        for shape in [TaskShape::MultipleChoice, TaskShape::Cloze, TaskShape::FreeForm] {
            assert_eq!(str_to_shape(shape_to_str(shape)).unwrap(), shape);
        }
        for mode in [ExecutionMode::Generative, ExecutionMode::Perplexity, ExecutionMode::Mixed] {
            assert_eq!(str_to_mode(mode_to_str(mode)).unwrap(), mode);
        }
        assert!(str_to_mode("few-shot").is_err());
    }
}
