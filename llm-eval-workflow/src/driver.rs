use llm_eval_core::{CoreError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::OpenOptions;
use tokio::process::Command;
use tracing::{error, info};

use crate::config::{EngineCommand, LOG_FILE_NAME};

/// Launches the external engine and waits for it.
///
/// Stdout and stderr are appended to one log file in the workspace, so a
/// re-run of the same workspace keeps the earlier output.
#[derive(Debug, Clone)]
pub struct ExecutionDriver {
    command: EngineCommand,
}

impl ExecutionDriver {
    pub fn new(command: EngineCommand) -> Self {
        Self { command }
    }

    pub fn log_path(workspace: &Path) -> PathBuf {
        workspace.join(LOG_FILE_NAME)
    }

    pub async fn run(&self, artifact: &Path, workspace: &Path) -> Result<()> {
        tokio::fs::create_dir_all(workspace).await?;
        let log_path = Self::log_path(workspace);
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await?
            .into_std()
            .await;
        let stderr = stdout.try_clone()?;

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(artifact)
            .arg("-w")
            .arg(workspace)
            .arg("--debug")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(program = %self.command.program, error = %e, "Failed to launch engine");
                CoreError::Io(e)
            })?;

        info!(
            program = %self.command.program,
            artifact = %artifact.display(),
            log = %log_path.display(),
            pid = child.id(),
            "Engine started"
        );

        let status = child.wait().await?;
        if status.success() {
            info!(artifact = %artifact.display(), "Engine finished");
            Ok(())
        } else {
            error!(exit_code = ?status.code(), log = %log_path.display(), "Engine failed");
            Err(CoreError::EngineExecutionFailed {
                exit_code: status.code(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shell(script: &str) -> ExecutionDriver {
        ExecutionDriver::new(EngineCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "engine".to_string()],
        })
    }

    #[tokio::test]
    async fn test_log_collects_both_streams_and_appends_across_runs() {
        let root = tempfile::tempdir().unwrap();
        let workspace = root.path().join("task");
        let artifact = root.path().join("config.py");
        let driver = shell("echo \"out $2\"; echo err >&2");

        driver.run(&artifact, &workspace).await.unwrap();
        driver.run(&artifact, &workspace).await.unwrap();

        let log = std::fs::read_to_string(ExecutionDriver::log_path(&workspace)).unwrap();
        assert_eq!(log, "out -w\nerr\nout -w\nerr\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_code() {
        let root = tempfile::tempdir().unwrap();
        let err = shell("exit 3")
            .run(&root.path().join("config.py"), &root.path().join("task"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EngineExecutionFailed { exit_code: Some(3) }));
    }
}
