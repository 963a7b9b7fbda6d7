use futures::stream::{self, Stream};
use llm_eval_core::{CoreError, EvalStore, Result, TaskId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::config::LogTailConfig;

enum Phase {
    Waiting { attempt: u32 },
    Reading {
        reader: BufReader<File>,
        partial: String,
        /// Set once the task is terminal; the next EOF ends the stream.
        draining: bool,
    },
    Done,
}

struct TailState {
    store: Arc<dyn EvalStore>,
    config: LogTailConfig,
    task_id: TaskId,
    path: PathBuf,
    phase: Phase,
}

impl TailState {
    async fn task_finished(&self) -> Result<bool> {
        Ok(self
            .store
            .get_task(self.task_id)
            .await?
            .map(|t| t.is_terminal())
            .unwrap_or(true))
    }

    async fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            match &mut self.phase {
                Phase::Done => return None,
                Phase::Waiting { attempt } => {
                    match File::open(&self.path).await {
                        Ok(file) => {
                            self.phase = Phase::Reading {
                                reader: BufReader::new(file),
                                partial: String::new(),
                                draining: false,
                            };
                        }
                        Err(_) if *attempt < self.config.wait_retries => {
                            *attempt += 1;
                            tokio::time::sleep(self.config.poll_interval()).await;
                        }
                        Err(e) => {
                            self.phase = Phase::Done;
                            return Some(Err(CoreError::NotFound(format!(
                                "Log file {} did not appear: {}",
                                self.path.display(),
                                e
                            ))));
                        }
                    }
                }
                Phase::Reading { reader, partial, draining } => {
                    let mut chunk = String::new();
                    let read = match reader.read_line(&mut chunk).await {
                        Ok(n) => n,
                        Err(e) => {
                            self.phase = Phase::Done;
                            return Some(Err(CoreError::Io(e)));
                        }
                    };

                    if read > 0 {
                        partial.push_str(&chunk);
                        if partial.ends_with('\n') {
                            let line = std::mem::take(partial);
                            return Some(Ok(line.trim_end_matches(['\n', '\r']).to_string()));
                        }
                        continue;
                    }

                    if *draining {
                        let rest = std::mem::take(partial);
                        self.phase = Phase::Done;
                        if rest.is_empty() {
                            return None;
                        }
                        return Some(Ok(rest));
                    }

                    match self.task_finished().await {
                        Ok(true) => {
                            debug!(task_id = %self.task_id, "Task finished, draining log");
                            if let Phase::Reading { draining, .. } = &mut self.phase {
                                *draining = true;
                            }
                        }
                        Ok(false) => tokio::time::sleep(self.config.poll_interval()).await,
                        Err(e) => {
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                    }
                }
            }
        }
    }
}

/// Streams a task's log: existing content first, then appended lines,
/// until the task is terminal and the file is exhausted.
pub struct LogTailer {
    store: Arc<dyn EvalStore>,
    config: LogTailConfig,
}

impl LogTailer {
    pub fn new(store: Arc<dyn EvalStore>, config: LogTailConfig) -> Self {
        Self { store, config }
    }

    pub fn tail(&self, task_id: TaskId, path: PathBuf) -> impl Stream<Item = Result<String>> + Send + 'static {
        let state = TailState {
            store: self.store.clone(),
            config: self.config.clone(),
            task_id,
            path,
            phase: Phase::Waiting { attempt: 0 },
        };
        stream::unfold(state, |mut state| async move {
            let item = state.next_line().await?;
            Some((item, state))
        })
    }
}
