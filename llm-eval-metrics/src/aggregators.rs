use llm_eval_core::{RadarEntry, ResultSummary, TableRow};
use serde::{Deserialize, Serialize};

use crate::normalizer::{round1, ScoreNormalizer, SCALE_MAX};

/// One harvested score tagged with its capability category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntry {
    pub dataset: String,
    pub category: String,
    pub metric: String,
    pub score: f64,
}

impl ScoreEntry {
    pub fn new(
        dataset: impl Into<String>,
        category: impl Into<String>,
        metric: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            category: category.into(),
            metric: metric.into(),
            score,
        }
    }
}

/// Running mean for one category.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Groups normalized scores by capability category.
pub struct CategoryAggregator {
    normalizer: ScoreNormalizer,
}

impl CategoryAggregator {
    pub fn new(normalizer: ScoreNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &ScoreNormalizer {
        &self.normalizer
    }

    /// Mean normalized score per category, in first-seen order. Categories
    /// with only excluded metrics are absent.
    pub fn category_means(&self, entries: &[ScoreEntry]) -> Vec<(String, f64)> {
        let mut order: Vec<(String, Accumulator)> = Vec::new();

        for entry in entries {
            let Some(value) = self.normalizer.normalize(&entry.metric, entry.score) else {
                tracing::debug!(
                    dataset = %entry.dataset,
                    metric = %entry.metric,
                    "Lower-is-better metric left out of category average"
                );
                continue;
            };
            match order.iter_mut().find(|(name, _)| *name == entry.category) {
                Some((_, acc)) => acc.push(value),
                None => {
                    let mut acc = Accumulator::default();
                    acc.push(value);
                    order.push((entry.category.clone(), acc));
                }
            }
        }

        order
            .into_iter()
            .filter_map(|(name, acc)| acc.mean().map(|mean| (name, mean)))
            .collect()
    }

    pub fn radar(&self, entries: &[ScoreEntry]) -> Vec<RadarEntry> {
        self.category_means(entries)
            .into_iter()
            .map(|(name, mean)| RadarEntry {
                name,
                max: SCALE_MAX as u32,
                score: round1(mean),
            })
            .collect()
    }

    /// Literal per-dataset rows, raw scores untouched.
    pub fn table(entries: &[ScoreEntry]) -> Vec<TableRow> {
        entries
            .iter()
            .map(|e| TableRow {
                dataset: e.dataset.clone(),
                capability: e.category.clone(),
                metric: e.metric.clone(),
                score: e.score,
            })
            .collect()
    }

    /// Radar plus table. Timing is filled in when the task completes.
    pub fn summarize(&self, entries: &[ScoreEntry]) -> ResultSummary {
        ResultSummary {
            radar: self.radar(entries),
            table: Self::table(entries),
            timing: None,
        }
    }
}

impl Default for CategoryAggregator {
    fn default() -> Self {
        Self::new(ScoreNormalizer::default())
    }
}
