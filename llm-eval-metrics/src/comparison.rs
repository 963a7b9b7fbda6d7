use chrono::{DateTime, Utc};
use llm_eval_core::{CoreError, Result, SchemeId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::aggregators::{CategoryAggregator, ScoreEntry};
use crate::normalizer::{round1, SCALE_MAX};

/// One completed task's scores, as fed to the comparator.
#[derive(Debug, Clone)]
pub struct ComparedTask {
    pub task_id: TaskId,
    pub model_name: String,
    pub scheme_id: Option<SchemeId>,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskColumn {
    pub task_id: TaskId,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

/// Scores for one (dataset, metric) key, one slot per task.
///
/// `diffs[i]` compares task `i + 1` with the baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonRow {
    pub dataset: String,
    pub metric: String,
    pub scores: Vec<Option<f64>>,
    pub diffs: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarIndicator {
    pub name: String,
    pub max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarSeries {
    pub task_id: TaskId,
    pub name: String,
    /// Aligned with the report's indicators.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonReport {
    pub scheme_id: SchemeId,
    pub baseline: TaskId,
    pub tasks: Vec<TaskColumn>,
    pub rows: Vec<ComparisonRow>,
    pub indicators: Vec<RadarIndicator>,
    pub series: Vec<RadarSeries>,
}

/// Aligns several runs of one scheme against the first (baseline) run.
pub struct Comparator {
    aggregator: CategoryAggregator,
}

impl Comparator {
    pub fn new(aggregator: CategoryAggregator) -> Self {
        Self { aggregator }
    }

    /// Checks the task list is comparable and returns the shared scheme.
    pub fn shared_scheme(tasks: &[ComparedTask]) -> Result<SchemeId> {
        if tasks.len() < 2 {
            return Err(CoreError::IncomparableTasks(
                "at least two tasks are required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = tasks.iter().find(|t| !seen.insert(t.task_id)) {
            return Err(CoreError::IncomparableTasks(format!(
                "task {} is listed more than once",
                dup.task_id
            )));
        }

        let first = tasks[0].scheme_id.ok_or_else(|| {
            CoreError::IncomparableTasks(format!("task {} was not created from a scheme", tasks[0].task_id))
        })?;
        for task in &tasks[1..] {
            match task.scheme_id {
                Some(id) if id == first => {}
                Some(id) => {
                    return Err(CoreError::IncomparableTasks(format!(
                        "task {} uses scheme {}, baseline uses {}",
                        task.task_id, id, first
                    )))
                }
                None => {
                    return Err(CoreError::IncomparableTasks(format!(
                        "task {} was not created from a scheme",
                        task.task_id
                    )))
                }
            }
        }
        Ok(first)
    }

    pub fn compare(&self, tasks: &[ComparedTask]) -> Result<ComparisonReport> {
        let scheme_id = Self::shared_scheme(tasks)?;

        Ok(ComparisonReport {
            scheme_id,
            baseline: tasks[0].task_id,
            tasks: tasks
                .iter()
                .map(|t| TaskColumn {
                    task_id: t.task_id,
                    model_name: t.model_name.clone(),
                    created_at: t.created_at,
                })
                .collect(),
            rows: Self::rows(tasks),
            indicators: Vec::new(),
            series: Vec::new(),
        }
        .with_radar(self.radar(tasks)))
    }

    fn rows(tasks: &[ComparedTask]) -> Vec<ComparisonRow> {
        let mut keys: Vec<(String, String)> = Vec::new();
        for task in tasks {
            for entry in &task.entries {
                let key = (entry.dataset.clone(), entry.metric.clone());
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        keys.into_iter()
            .map(|(dataset, metric)| {
                let scores: Vec<Option<f64>> = tasks
                    .iter()
                    .map(|t| {
                        t.entries
                            .iter()
                            .find(|e| e.dataset == dataset && e.metric == metric)
                            .map(|e| e.score)
                    })
                    .collect();
                let baseline = scores[0];
                let diffs = scores[1..]
                    .iter()
                    .map(|score| match (score, baseline) {
                        (Some(s), Some(b)) => Some(round2(s - b)),
                        _ => None,
                    })
                    .collect();
                ComparisonRow {
                    dataset,
                    metric,
                    scores,
                    diffs,
                }
            })
            .collect()
    }

    fn radar(&self, tasks: &[ComparedTask]) -> (Vec<RadarIndicator>, Vec<RadarSeries>) {
        let per_task: Vec<Vec<(String, f64)>> = tasks
            .iter()
            .map(|t| self.aggregator.category_means(&t.entries))
            .collect();

        let mut axis: Vec<String> = Vec::new();
        for means in &per_task {
            for (name, _) in means {
                if !axis.contains(name) {
                    axis.push(name.clone());
                }
            }
        }

        let series = tasks
            .iter()
            .zip(&per_task)
            .map(|(task, means)| RadarSeries {
                task_id: task.task_id,
                name: task.model_name.clone(),
                values: axis
                    .iter()
                    .map(|category| {
                        means
                            .iter()
                            .find(|(name, _)| name == category)
                            .map(|(_, mean)| round1(*mean))
                            .unwrap_or(0.0)
                    })
                    .collect(),
            })
            .collect();

        let indicators = axis
            .into_iter()
            .map(|name| RadarIndicator {
                name,
                max: SCALE_MAX as u32,
            })
            .collect();

        (indicators, series)
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(CategoryAggregator::default())
    }
}

impl ComparisonReport {
    fn with_radar(mut self, radar: (Vec<RadarIndicator>, Vec<RadarSeries>)) -> Self {
        self.indicators = radar.0;
        self.series = radar.1;
        self
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
