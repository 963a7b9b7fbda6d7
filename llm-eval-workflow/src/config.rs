use llm_eval_core::TaskId;
use llm_eval_metrics::DEFAULT_LOWER_IS_BETTER;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the combined stdout/stderr log inside a task workspace.
pub const LOG_FILE_NAME: &str = "output.log";

/// How the external engine is launched. The artifact path and
/// `-w <workspace> --debug` are appended to `args`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for EngineCommand {
    fn default() -> Self {
        Self {
            program: "opencompass".to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogTailConfig {
    pub poll_interval_ms: u64,
    /// Polls to wait for the log file to appear before giving up.
    pub wait_retries: u32,
}

impl Default for LogTailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            wait_retries: 20,
        }
    }
}

impl LogTailConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Runtime settings of the orchestration services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Parent of every per-task workspace directory.
    pub workspace_root: PathBuf,
    /// Root that `official://` references resolve against.
    pub official_root: PathBuf,
    pub engine: EngineCommand,
    pub max_concurrent_tasks: usize,
    pub heartbeat_interval_secs: u64,
    pub stale_after_secs: u64,
    pub log_tail: LogTailConfig,
    /// Metric-name fragments treated as lower-is-better.
    pub lower_is_better: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workspace/tasks"),
            official_root: PathBuf::from("data/official"),
            engine: EngineCommand::default(),
            max_concurrent_tasks: 2,
            heartbeat_interval_secs: 30,
            stale_after_secs: 600,
            log_tail: LogTailConfig::default(),
            lower_is_better: DEFAULT_LOWER_IS_BETTER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_official_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.official_root = root.into();
        self
    }

    pub fn with_engine(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.engine = EngineCommand {
            program: program.into(),
            args,
        };
        self
    }

    pub fn task_workspace(&self, task_id: TaskId) -> PathBuf {
        self.workspace_root.join(format!("task_{}", task_id))
    }

    pub fn log_path(&self, task_id: TaskId) -> PathBuf {
        self.task_workspace(task_id).join(LOG_FILE_NAME)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs as i64)
    }
}
