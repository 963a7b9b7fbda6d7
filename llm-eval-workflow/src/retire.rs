use llm_eval_core::{CoreError, DatasetMetaId, EvalStore, FileReference, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetireReport {
    pub removed_files: Vec<PathBuf>,
}

/// Soft-deletes a dataset meta and removes the files of its private
/// configurations. Task snapshots keep referring to the old content.
pub struct DatasetRetirer {
    store: Arc<dyn EvalStore>,
}

impl DatasetRetirer {
    pub fn new(store: Arc<dyn EvalStore>) -> Self {
        Self { store }
    }

    pub async fn retire(&self, meta_id: DatasetMetaId) -> Result<RetireReport> {
        if !self.store.soft_delete_meta(meta_id).await? {
            return Err(CoreError::NotFound(format!(
                "Dataset {} not found or already retired",
                meta_id
            )));
        }

        let mut report = RetireReport::default();
        for config in self.store.configs_for_meta(meta_id).await? {
            let FileReference::Path(path) = &config.file_ref else {
                continue;
            };
            match tokio::fs::remove_file(path).await {
                Ok(()) => report.removed_files.push(path.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(config_id = %config.id, path = %path.display(), error = %e, "Failed to remove dataset file"),
            }
        }

        info!(meta_id = %meta_id, removed = report.removed_files.len(), "Dataset retired");
        Ok(report)
    }
}
