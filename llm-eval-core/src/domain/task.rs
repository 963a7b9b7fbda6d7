use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dataset::{DatasetConfig, DatasetMeta, Modality};
use super::ids::{ContentHash, DatasetConfigId, ModelId, SchemeId, TaskId};
use super::summary::{ResultSummary, RunTiming};
use crate::error::{CoreError, Result};

/// Progress recorded when a worker picks a task up. Non-zero so that
/// "started" can be told apart from "queued".
pub const STARTED_PROGRESS: u8 = 1;
pub const MAX_PROGRESS: u8 = 100;

// ===== Task Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, target),
            (Pending, Running) | (Running, Success) | (Running, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "success" => Some(TaskStatus::Success),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Evaluation Task =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationTask {
    pub id: TaskId,
    pub model_id: ModelId,
    pub scheme_id: Option<SchemeId>,
    pub config_ids: Vec<DatasetConfigId>,
    pub status: TaskStatus,
    pub progress: u8,
    pub error_msg: Option<String>,
    pub summary: Option<ResultSummary>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Last liveness signal from the worker running this task.
    pub heartbeat_at: Option<DateTime<Utc>>,
}

impl EvaluationTask {
    pub fn new(model_id: ModelId, scheme_id: Option<SchemeId>, config_ids: Vec<DatasetConfigId>) -> Self {
        Self {
            id: TaskId::new(),
            model_id,
            scheme_id,
            config_ids,
            status: TaskStatus::Pending,
            progress: 0,
            error_msg: None,
            summary: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            heartbeat_at: None,
        }
    }

    fn transition(&mut self, target: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(&target) {
            return Err(CoreError::InvalidState(format!(
                "Task {} cannot move from {} to {}",
                self.id, self.status, target
            )));
        }
        self.status = target;
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.status != TaskStatus::Running {
            return Err(CoreError::InvalidState(format!(
                "Task {} is {}, not running",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// `pending -> running`. The only place progress is reset.
    pub fn start(&mut self) -> Result<()> {
        self.transition(TaskStatus::Running)?;
        let now = Utc::now();
        self.progress = STARTED_PROGRESS;
        self.error_msg = None;
        self.started_at = Some(now);
        self.heartbeat_at = Some(now);
        Ok(())
    }

    /// Raises progress. Lower values are ignored so progress never goes back.
    pub fn advance(&mut self, progress: u8) -> Result<()> {
        self.ensure_running()?;
        if progress > MAX_PROGRESS {
            return Err(CoreError::Validation(format!(
                "Progress {} exceeds {}",
                progress, MAX_PROGRESS
            )));
        }
        self.progress = self.progress.max(progress);
        Ok(())
    }

    pub fn heartbeat(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.heartbeat_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self, mut summary: ResultSummary) -> Result<()> {
        self.transition(TaskStatus::Success)?;
        let now = Utc::now();
        if let Some(started_at) = self.started_at {
            summary.timing = Some(RunTiming::between(started_at, now));
        }
        self.progress = MAX_PROGRESS;
        self.summary = Some(summary);
        self.finished_at = Some(now);
        Ok(())
    }

    /// `running -> failed`, keeping the message verbatim.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        self.error_msg = Some(message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Most recent sign of life: the heartbeat, else the start time.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.heartbeat_at.or(self.started_at)
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

// ===== Link Snapshots =====

/// Everything a run needs to know about one dataset configuration, frozen
/// at task creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSnapshot {
    pub config: DatasetConfig,
    pub meta_name: String,
    pub category: String,
    pub modality: Modality,
}

impl ConfigSnapshot {
    pub fn capture(config: &DatasetConfig, meta: &DatasetMeta) -> Self {
        Self {
            config: config.clone(),
            meta_name: meta.name.clone(),
            category: meta.category.clone(),
            modality: meta.modality,
        }
    }
}

/// Immutable (task, configuration) association carrying the snapshot text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDatasetLink {
    pub task_id: TaskId,
    pub dataset_config_id: DatasetConfigId,
    pub snapshot: String,
    pub content_hash: ContentHash,
    pub created_at: DateTime<Utc>,
}

impl TaskDatasetLink {
    pub fn capture(task_id: TaskId, snapshot: &ConfigSnapshot) -> Result<Self> {
        let text = serde_json::to_string(snapshot)?;
        Ok(Self {
            task_id,
            dataset_config_id: snapshot.config.id,
            content_hash: ContentHash::of_str(&text),
            snapshot: text,
            created_at: Utc::now(),
        })
    }

    /// Decodes the snapshot, refusing text that no longer matches its hash.
    pub fn decode(&self) -> Result<ConfigSnapshot> {
        if ContentHash::of_str(&self.snapshot) != self.content_hash {
            return Err(CoreError::Serialization(format!(
                "Snapshot of config {} for task {} does not match its content hash",
                self.dataset_config_id, self.task_id
            )));
        }
        Ok(serde_json::from_str(&self.snapshot)?)
    }
}
