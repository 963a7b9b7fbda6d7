use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use validator::Validate;

use super::ids::{DatasetConfigId, DatasetMetaId};

/// Scheme prefix marking a reference into an officially registered definition.
pub const OFFICIAL_PREFIX: &str = "official://";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskShape {
    MultipleChoice,
    Cloze,
    FreeForm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Generative,
    Perplexity,
    Mixed,
}

/// Where a dataset configuration's records come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileReference {
    /// A private flat file on the local filesystem.
    Path(PathBuf),
    /// Path of a registered definition, relative to the official root.
    Official(String),
}

impl FileReference {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix(OFFICIAL_PREFIX) {
            if rest.is_empty() {
                return Err("official reference has no target".to_string());
            }
            return Ok(FileReference::Official(rest.to_string()));
        }
        if raw.is_empty() {
            return Err("file reference is empty".to_string());
        }
        Ok(FileReference::Path(PathBuf::from(raw)))
    }

    pub fn is_official(&self) -> bool {
        matches!(self, FileReference::Official(_))
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileReference::Path(path) => write!(f, "{}", path.display()),
            FileReference::Official(target) => write!(f, "{}{}", OFFICIAL_PREFIX, target),
        }
    }
}

impl TryFrom<String> for FileReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FileReference::parse(&value)
    }
}

impl From<FileReference> for String {
    fn from(value: FileReference) -> Self {
        value.to_string()
    }
}

/// Evaluator families the engine can build from a metric shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EvaluatorFamily {
    #[serde(rename = "AccEvaluator")]
    Accuracy,
    #[serde(rename = "BleuEvaluator")]
    Bleu,
    #[serde(rename = "RougeEvaluator")]
    Rouge,
    #[serde(rename = "EMEvaluator")]
    ExactMatch,
}

impl EvaluatorFamily {
    pub fn type_name(&self) -> &'static str {
        match self {
            EvaluatorFamily::Accuracy => "AccEvaluator",
            EvaluatorFamily::Bleu => "BleuEvaluator",
            EvaluatorFamily::Rouge => "RougeEvaluator",
            EvaluatorFamily::ExactMatch => "EMEvaluator",
        }
    }

    /// Resolves a stored evaluator token. Accepts the engine type name and the
    /// short labels used by the dataset editor.
    pub fn resolve(token: &str) -> Option<Self> {
        match token.trim() {
            "AccEvaluator" | "Accuracy" | "Acc" => Some(EvaluatorFamily::Accuracy),
            "BleuEvaluator" | "BLEU" | "Bleu" => Some(EvaluatorFamily::Bleu),
            "RougeEvaluator" | "ROUGE" | "Rouge" => Some(EvaluatorFamily::Rouge),
            "EMEvaluator" | "EM" | "ExactMatch" => Some(EvaluatorFamily::ExactMatch),
            _ => None,
        }
    }
}

/// Groups dataset configurations under one logical dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct DatasetMeta {
    pub id: DatasetMetaId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Capability category used for radar aggregation, e.g. "Math".
    pub category: String,
    pub modality: Modality,
    pub record_count: Option<i64>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl DatasetMeta {
    pub fn new(name: impl Into<String>, category: impl Into<String>, modality: Modality) -> Self {
        Self {
            id: DatasetMetaId::new(),
            name: name.into(),
            category: category.into(),
            modality,
            record_count: None,
            deleted: false,
            created_at: Utc::now(),
        }
    }
}

/// One evaluable variant of a logical dataset.
///
/// The shape blobs are kept as raw JSON text exactly as the dataset editor
/// stored them; the assembler decides how to interpret (or replace) them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct DatasetConfig {
    pub id: DatasetConfigId,
    pub meta_id: DatasetMetaId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub task_shape: TaskShape,
    pub mode: ExecutionMode,
    pub file_ref: FileReference,
    pub display_metric: String,
    pub reader_shape: Option<String>,
    pub infer_shape: Option<String>,
    pub metric_shape: Option<String>,
    pub postprocess_shape: Option<String>,
    pub fewshot_shape: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DatasetConfig {
    pub fn new(
        meta_id: DatasetMetaId,
        name: impl Into<String>,
        task_shape: TaskShape,
        mode: ExecutionMode,
        file_ref: FileReference,
    ) -> Self {
        Self {
            id: DatasetConfigId::new(),
            meta_id,
            name: name.into(),
            task_shape,
            mode,
            file_ref,
            display_metric: "Accuracy".to_string(),
            reader_shape: None,
            infer_shape: None,
            metric_shape: None,
            postprocess_shape: None,
            fewshot_shape: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_display_metric(mut self, metric: impl Into<String>) -> Self {
        self.display_metric = metric.into();
        self
    }

    pub fn with_reader_shape(mut self, shape: serde_json::Value) -> Self {
        self.reader_shape = Some(shape.to_string());
        self
    }

    pub fn with_infer_shape(mut self, shape: serde_json::Value) -> Self {
        self.infer_shape = Some(shape.to_string());
        self
    }

    pub fn with_metric_shape(mut self, shape: serde_json::Value) -> Self {
        self.metric_shape = Some(shape.to_string());
        self
    }

    pub fn with_postprocess_shape(mut self, shape: serde_json::Value) -> Self {
        self.postprocess_shape = Some(shape.to_string());
        self
    }

    pub fn with_fewshot_shape(mut self, shape: serde_json::Value) -> Self {
        self.fewshot_shape = Some(shape.to_string());
        self
    }

    pub fn is_official(&self) -> bool {
        self.file_ref.is_official()
    }

    /// Checks the stored shapes against the configuration invariants: the
    /// reader must name its input and output columns, and a declared
    /// evaluator must belong to a known family.
    pub fn validate_shapes(&self) -> Vec<ShapeViolation> {
        let mut violations = Vec::new();

        match parse_object(self.reader_shape.as_deref()) {
            Some(reader) => {
                if !reader_declares_columns(&reader) {
                    violations.push(ShapeViolation::ReaderColumnsMissing);
                }
            }
            None => violations.push(ShapeViolation::ReaderUnparseable),
        }

        if let Some(raw) = self.metric_shape.as_deref().filter(|s| !s.trim().is_empty()) {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Object(metric)) => {
                    if let Some(token) = evaluator_token(&metric) {
                        if EvaluatorFamily::resolve(&token).is_none() {
                            violations.push(ShapeViolation::UnknownEvaluator(token));
                        }
                    }
                }
                _ => violations.push(ShapeViolation::MetricUnparseable),
            }
        }

        violations
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeViolation {
    ReaderUnparseable,
    ReaderColumnsMissing,
    MetricUnparseable,
    UnknownEvaluator(String),
}

impl fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeViolation::ReaderUnparseable => write!(f, "reader shape is absent or not an object"),
            ShapeViolation::ReaderColumnsMissing => {
                write!(f, "reader shape does not declare input_columns and output_column")
            }
            ShapeViolation::MetricUnparseable => write!(f, "metric shape is not an object"),
            ShapeViolation::UnknownEvaluator(token) => write!(f, "unknown evaluator family '{}'", token),
        }
    }
}

/// Parses an optional JSON blob, yielding its map only when it is a non-empty object.
pub fn parse_object(raw: Option<&str>) -> Option<serde_json::Map<String, serde_json::Value>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// True when a reader shape names both its input columns and its output column.
pub fn reader_declares_columns(reader: &serde_json::Map<String, serde_json::Value>) -> bool {
    let has_inputs = reader
        .get("input_columns")
        .map(|v| v.is_array() || v.is_string())
        .unwrap_or(false);
    let has_output = reader
        .get("output_column")
        .map(|v| v.is_string())
        .unwrap_or(false);
    has_inputs && has_output
}

/// Extracts the evaluator type token from a metric shape. Both the nested
/// `{"evaluator": {"type": ..}}` and the flat `{"type": ..}` layouts occur.
pub fn evaluator_token(metric: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    metric
        .get("evaluator")
        .and_then(|e| e.get("type"))
        .or_else(|| metric.get("type"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}
