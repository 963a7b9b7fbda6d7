//! Result Harvester: locates the engine's summary tables in a task
//! workspace and turns their rows into attributed scores.

use llm_eval_core::{ConfigSnapshot, CoreError, DatasetConfigId, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::assembler::ConfigAssembler;

/// Columns that never hold a model's score.
pub const NON_SCORE_COLUMNS: &[&str] = &["dataset", "version", "metric", "mode"];

const SUMMARY_DIR: &str = "summary";

/// One usable summary row.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestedRow {
    pub config_id: DatasetConfigId,
    pub dataset: String,
    pub metric: String,
    pub score: f64,
    pub raw_row: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub tables: Vec<PathBuf>,
    pub rows: Vec<HarvestedRow>,
}

/// Maps a summary row's dataset key back to a configuration of the run.
#[derive(Debug, Clone)]
pub struct RowAttributor {
    abbr_map: HashMap<String, DatasetConfigId>,
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone)]
struct Candidate {
    id: DatasetConfigId,
    key: String,
    config_name: String,
    meta_name: String,
}

impl RowAttributor {
    pub fn new(abbr_map: HashMap<String, DatasetConfigId>, snapshots: &[ConfigSnapshot]) -> Self {
        let candidates = snapshots
            .iter()
            .map(|s| Candidate {
                id: s.config.id,
                key: ConfigAssembler::dataset_key(&s.config),
                config_name: s.config.name.clone(),
                meta_name: s.meta_name.clone(),
            })
            .collect();
        Self { abbr_map, candidates }
    }

    /// Returns the configuration id and the display name for a row's
    /// dataset key, or `None` when the run has no configurations at all.
    pub fn attribute(&self, dataset: &str) -> Option<(DatasetConfigId, String)> {
        if let Some(id) = self.abbr_map.get(dataset) {
            let display = self
                .candidates
                .iter()
                .find(|c| c.id == *id)
                .map(|c| format!("{}{}", c.config_name, dataset.strip_prefix(&c.key).unwrap_or("")))
                .unwrap_or_else(|| dataset.to_string());
            return Some((*id, display));
        }

        if let Some(c) = self.candidates.iter().find(|c| c.config_name == dataset) {
            return Some((c.id, c.config_name.clone()));
        }

        let lowered = dataset.to_lowercase();
        if let Some(c) = self.candidates.iter().find(|c| {
            let meta = c.meta_name.to_lowercase();
            !meta.is_empty() && (lowered.contains(&meta) || meta.contains(&lowered))
        }) {
            debug!(dataset, config_id = %c.id, "Attributed row by dataset name containment");
            return Some((c.id, dataset.to_string()));
        }

        let first = self.candidates.first()?;
        warn!(
            dataset,
            config_id = %first.id,
            "No configuration matches summary row, attributing to the first configuration"
        );
        Some((first.id, dataset.to_string()))
    }
}

/// Lists summary tables under `workspace`, sorted by path.
pub fn find_tables(workspace: &Path) -> Vec<PathBuf> {
    let mut tables: Vec<PathBuf> = WalkDir::new(workspace)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_summary_table(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    tables.sort();
    tables
}

fn is_summary_table(path: &Path) -> bool {
    let in_summary_dir = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name == SUMMARY_DIR)
        .unwrap_or(false);
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    in_summary_dir && name.starts_with("summary") && name.ends_with(".csv")
}

fn parse_score(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Score column chosen for one table.
enum ScoreColumn {
    Hinted(usize),
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct ResultHarvester {
    /// Column named after the evaluated model.
    score_hint: Option<String>,
}

impl ResultHarvester {
    pub fn new(score_hint: Option<String>) -> Self {
        Self { score_hint }
    }

    /// Reads every summary table in the workspace. Tables that fail to
    /// parse are skipped; finding no usable table at all is an error.
    pub fn harvest(&self, workspace: &Path, attributor: &RowAttributor) -> Result<Harvest> {
        let mut harvest = Harvest::default();

        for table in find_tables(workspace) {
            match self.read_table(&table, attributor) {
                Ok(rows) => {
                    debug!(path = %table.display(), rows = rows.len(), "Harvested summary table");
                    harvest.rows.extend(rows);
                    harvest.tables.push(table);
                }
                Err(e) => {
                    warn!(path = %table.display(), error = %e, "Skipping unreadable summary table");
                }
            }
        }

        if harvest.tables.is_empty() {
            return Err(CoreError::NoSummaryFound(workspace.display().to_string()));
        }
        Ok(harvest)
    }

    pub fn read_table(&self, path: &Path, attributor: &RowAttributor) -> Result<Vec<HarvestedRow>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let dataset_idx = column("dataset").ok_or_else(|| {
            CoreError::Serialization(format!("{} has no dataset column", path.display()))
        })?;
        let metric_idx = column("metric");

        let score_column = match self.score_hint.as_deref().and_then(|hint| column(hint)) {
            Some(idx) => ScoreColumn::Hinted(idx),
            None => {
                warn!(
                    path = %path.display(),
                    hint = ?self.score_hint,
                    "Score column hint not found, falling back to rightmost numeric column"
                );
                ScoreColumn::Heuristic
            }
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or("").trim();

            let dataset = field(dataset_idx).to_string();
            if dataset.is_empty() {
                continue;
            }
            let metric = metric_idx
                .map(field)
                .filter(|m| !m.is_empty())
                .unwrap_or("score")
                .to_string();

            let score = match score_column {
                ScoreColumn::Hinted(idx) => parse_score(field(idx)),
                ScoreColumn::Heuristic => (0..headers.len())
                    .rev()
                    .filter(|idx| !NON_SCORE_COLUMNS.contains(&headers[*idx].as_str()))
                    .find_map(|idx| parse_score(field(idx))),
            };
            let Some(score) = score else {
                warn!(path = %path.display(), dataset = %dataset, metric = %metric, "Row has no numeric score, skipping");
                continue;
            };

            let Some((config_id, display)) = attributor.attribute(&dataset) else {
                continue;
            };

            let raw_row: Map<String, Value> = headers
                .iter()
                .enumerate()
                .map(|(idx, h)| (h.clone(), Value::String(field(idx).to_string())))
                .collect();

            rows.push(HarvestedRow {
                config_id,
                dataset: display,
                metric,
                score,
                raw_row: Value::Object(raw_row),
            });
        }
        Ok(rows)
    }
}
