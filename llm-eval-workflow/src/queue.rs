use async_trait::async_trait;
use llm_eval_core::{CoreError, JobSubmitter, Result, TaskId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::runner::TaskRunner;

/// Asynchronous job queue running submitted tasks on bounded workers.
///
/// A task id is accepted at most once per queue.
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<TaskId>,
    submitted: Mutex<HashSet<TaskId>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TaskQueue {
    /// Spawns the dispatcher. Must be called inside a tokio runtime.
    pub fn start(runner: Arc<TaskRunner>, max_concurrent: usize) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<TaskId>();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let dispatcher_cancel = cancel.clone();
        let workers = tracker.clone();
        tracker.spawn(async move {
            loop {
                let task_id = tokio::select! {
                    _ = dispatcher_cancel.cancelled() => break,
                    next = receiver.recv() => match next {
                        Some(id) => id,
                        None => break,
                    },
                };

                let permit = tokio::select! {
                    _ = dispatcher_cancel.cancelled() => break,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let runner = runner.clone();
                workers.spawn(async move {
                    let _permit = permit;
                    debug!(task_id = %task_id, "Worker picked up task");
                    if let Err(e) = runner.run(task_id).await {
                        error!(task_id = %task_id, error = %e, "Worker could not complete task");
                    }
                });
            }
            debug!("Task dispatcher stopped");
        });

        info!(max_concurrent, "Task queue started");
        Self {
            sender,
            submitted: Mutex::new(HashSet::new()),
            cancel,
            tracker,
        }
    }

    /// Stops dispatching queued tasks and waits for running ones.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Task queue shut down");
    }

    /// Runs everything already submitted, then stops.
    pub async fn drain(self) {
        let Self { sender, tracker, .. } = self;
        drop(sender);
        tracker.close();
        tracker.wait().await;
        info!("Task queue drained");
    }
}

#[async_trait]
impl JobSubmitter for TaskQueue {
    async fn submit(&self, task_id: TaskId) -> Result<()> {
        if !self.submitted.lock().await.insert(task_id) {
            debug!(task_id = %task_id, "Task already submitted");
            return Ok(());
        }
        self.sender
            .send(task_id)
            .map_err(|_| CoreError::Internal("task queue is closed".to_string()))
    }
}
