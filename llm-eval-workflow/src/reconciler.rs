use chrono::{DateTime, Duration, Utc};
use llm_eval_core::{CoreError, EvalStore, Result, TaskId, TaskStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fails `running` tasks whose worker stopped reporting.
pub struct Reconciler {
    store: Arc<dyn EvalStore>,
    stale_after: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn EvalStore>, stale_after: Duration) -> Self {
        Self { store, stale_after }
    }

    /// One pass. Returns the ids of the tasks marked failed.
    pub async fn reconcile_once(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>> {
        let mut failed = Vec::new();

        for mut task in self.store.list_tasks_by_status(TaskStatus::Running).await? {
            let Some(last_seen) = task.last_seen() else {
                continue;
            };
            if now - last_seen <= self.stale_after {
                continue;
            }

            task.fail(format!(
                "Worker stopped reporting: no heartbeat since {} (limit {}s)",
                last_seen.to_rfc3339(),
                self.stale_after.num_seconds()
            ))?;
            match self.store.update_task(&task).await {
                Ok(()) => {
                    warn!(task_id = %task.id, last_seen = %last_seen, "Marked stale task as failed");
                    failed.push(task.id);
                }
                Err(CoreError::InvalidState(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if !failed.is_empty() {
            info!(count = failed.len(), "Reconciled stale tasks");
        }
        Ok(failed)
    }

    /// Reconciles every `every` until `cancel` fires.
    pub async fn run(&self, every: std::time::Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_once(Utc::now()).await {
                        warn!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }
    }
}
