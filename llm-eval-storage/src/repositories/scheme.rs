use async_trait::async_trait;
use llm_eval_core::{CoreError, DatasetConfigId, Result, Scheme, SchemeId, SchemeStore};
use sqlx::Row;
use uuid::Uuid;

use super::PgStore;

#[async_trait]
impl SchemeStore for PgStore {
    async fn insert_scheme(&self, scheme: &Scheme) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schemes (id, name, description, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(scheme.id.0)
        .bind(&scheme.name)
        .bind(&scheme.description)
        .bind(scheme.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get_scheme(&self, id: SchemeId) -> Result<Option<Scheme>> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM schemes WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => {
                let id: Uuid = row.try_get("id")?;
                Ok(Some(Scheme {
                    id: SchemeId::from_uuid(id),
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    created_at: row.try_get("created_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn add_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<()> {
        if self.get_scheme(scheme_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Scheme {}", scheme_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO scheme_configs (scheme_id, config_id)
            VALUES ($1, $2)
            ON CONFLICT (scheme_id, config_id) DO NOTHING
            "#,
        )
        .bind(scheme_id.0)
        .bind(config_id.0)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn remove_scheme_config(&self, scheme_id: SchemeId, config_id: DatasetConfigId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheme_configs WHERE scheme_id = $1 AND config_id = $2")
            .bind(scheme_id.0)
            .bind(config_id.0)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scheme_config_ids(&self, scheme_id: SchemeId) -> Result<Vec<DatasetConfigId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT config_id FROM scheme_configs WHERE scheme_id = $1 ORDER BY position",
        )
        .bind(scheme_id.0)
        .fetch_all(self.pool())
        .await?;

        Ok(ids.into_iter().map(DatasetConfigId::from_uuid).collect())
    }
}
