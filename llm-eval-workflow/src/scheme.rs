use llm_eval_core::{CoreError, DatasetConfig, EvalStore, Result, SchemeId};
use std::sync::Arc;

/// Resolves a scheme to its current configurations. Never falls back to
/// configurations that have since been removed.
pub struct SchemeResolver {
    store: Arc<dyn EvalStore>,
}

impl SchemeResolver {
    pub fn new(store: Arc<dyn EvalStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, scheme_id: SchemeId) -> Result<Vec<DatasetConfig>> {
        if self.store.get_scheme(scheme_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Scheme {} not found", scheme_id)));
        }

        let ids = self.store.scheme_config_ids(scheme_id).await?;
        let configs = self.store.get_configs(&ids).await?;
        if configs.is_empty() {
            return Err(CoreError::EmptySelection(scheme_id.to_string()));
        }
        Ok(configs)
    }
}
