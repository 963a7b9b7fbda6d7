use llm_eval_core::{CoreError, EvalStore, Result, ResultSummary, TaskId, TaskStatus};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::OrchestratorConfig;
use crate::harvester::find_tables;

/// Name of the summary document inside the archive.
pub const SUMMARY_ENTRY: &str = "result_summary.json";

fn zip_error(e: zip::result::ZipError) -> CoreError {
    CoreError::Internal(format!("zip: {}", e))
}

/// Packs a successful task's summary tables and stored summary into a zip.
pub struct SummaryExporter {
    store: Arc<dyn EvalStore>,
    config: OrchestratorConfig,
}

impl SummaryExporter {
    pub fn new(store: Arc<dyn EvalStore>, config: OrchestratorConfig) -> Self {
        Self { store, config }
    }

    /// Writes `<dest_dir>/task_<id>_summary.zip` and returns its path.
    pub async fn export(&self, task_id: TaskId, dest_dir: &Path) -> Result<PathBuf> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {} not found", task_id)))?;
        if task.status != TaskStatus::Success {
            return Err(CoreError::InvalidState(format!(
                "Task {} is {}, only successful tasks have a summary",
                task_id, task.status
            )));
        }

        let summary = task.summary.unwrap_or_default();
        let workspace = self.config.task_workspace(task_id);
        let archive = dest_dir.join(format!("task_{}_summary.zip", task_id));

        tokio::fs::create_dir_all(dest_dir).await?;
        let target = archive.clone();
        let entries = tokio::task::spawn_blocking(move || write_archive(&target, &workspace, &summary))
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))??;

        info!(task_id = %task_id, path = %archive.display(), entries, "Exported summary archive");
        Ok(archive)
    }
}

fn write_archive(archive: &Path, workspace: &Path, summary: &ResultSummary) -> Result<usize> {
    let mut zip = ZipWriter::new(File::create(archive)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(SUMMARY_ENTRY, options).map_err(zip_error)?;
    zip.write_all(serde_json::to_string_pretty(summary)?.as_bytes())?;
    let mut entries = 1;

    for table in find_tables(workspace) {
        let name = table
            .strip_prefix(workspace)
            .unwrap_or(&table)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(&std::fs::read(&table)?)?;
        entries += 1;
    }

    zip.finish().map_err(zip_error)?;
    Ok(entries)
}
