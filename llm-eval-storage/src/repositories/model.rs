use async_trait::async_trait;
use chrono::{DateTime, Utc};
use llm_eval_core::{
    ConnectionParams, CoreError, InvocationFamily, ModelDescriptor, ModelId, ModelStore, Result,
};
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

use super::PgStore;

#[async_trait]
impl ModelStore for PgStore {
    async fn insert_model(&self, model: &ModelDescriptor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO models (id, name, family, path, api_key, base_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(model.id.0)
        .bind(&model.name)
        .bind(model.family.as_str())
        .bind(&model.connection.path)
        .bind(&model.connection.api_key)
        .bind(&model.connection.base_url)
        .bind(model.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get_model(&self, id: ModelId) -> Result<Option<ModelDescriptor>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, family, path, api_key, base_url, created_at
            FROM models
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.map(row_to_model).transpose()
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, family, path, api_key, base_url, created_at
            FROM models
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(row_to_model).collect()
    }
}

fn row_to_model(row: PgRow) -> Result<ModelDescriptor> {
    let id: Uuid = row.try_get("id")?;
    let family_str: String = row.try_get("family")?;
    let family = InvocationFamily::parse(&family_str)
        .ok_or_else(|| CoreError::Database(format!("Unknown model family '{}'", family_str)))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(ModelDescriptor {
        id: ModelId::from_uuid(id),
        name: row.try_get("name")?,
        family,
        connection: ConnectionParams {
            path: row.try_get("path")?,
            api_key: row.try_get("api_key")?,
            base_url: row.try_get("base_url")?,
        },
        created_at,
    })
}
