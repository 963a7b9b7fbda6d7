use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal per-dataset score as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub dataset: String,
    pub capability: String,
    pub metric: String,
    pub score: f64,
}

/// Averaged score of one capability category on the 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarEntry {
    pub name: String,
    pub max: u32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl RunTiming {
    pub fn between(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at,
            duration_seconds: (finished_at - started_at).num_seconds(),
        }
    }
}

/// Dashboard payload stored on a successful task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResultSummary {
    pub radar: Vec<RadarEntry>,
    pub table: Vec<TableRow>,
    pub timing: Option<RunTiming>,
}
