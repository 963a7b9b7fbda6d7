//! Typed form of the configuration artifact handed to the engine.
//!
//! Adapter kinds serialise to the engine's registry type names, so the
//! artifact is plain data and needs no post-processing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Modules the engine imports before building the registry, relative
    /// to the artifact's directory.
    pub custom_imports: Vec<String>,
    pub datasets: Vec<DatasetEntry>,
    pub models: Vec<ModelEntry>,
    pub summarizer: Summarizer,
    pub work_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DatasetEntry {
    Private(PrivateDataset),
    /// An entry copied from an official definition, `abbr` overridden.
    Official(Map<String, Value>),
}

impl DatasetEntry {
    pub fn abbr(&self) -> Option<&str> {
        match self {
            DatasetEntry::Private(p) => Some(&p.abbr),
            DatasetEntry::Official(map) => map.get("abbr").and_then(Value::as_str),
        }
    }
}

/// A flat newline-delimited JSON file read through the generic loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateDataset {
    pub abbr: String,
    #[serde(rename = "type")]
    pub loader: LoaderKind,
    pub path: String,
    pub reader_cfg: Map<String, Value>,
    pub infer_cfg: Map<String, Value>,
    pub eval_cfg: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoaderKind {
    SimpleJsonlDataset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ModelEntry {
    #[serde(rename = "OpenAI")]
    OpenAi(RemoteModel),
    #[serde(rename = "HuggingFaceCausalLM")]
    HuggingFaceCausalLm(LocalModel),
}

impl ModelEntry {
    pub fn abbr(&self) -> &str {
        match self {
            ModelEntry::OpenAi(m) => &m.abbr,
            ModelEntry::HuggingFaceCausalLm(m) => &m.abbr,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteModel {
    pub abbr: String,
    pub path: String,
    pub key: String,
    pub openai_api_base: String,
    pub meta_template: MetaTemplate,
    pub query_per_second: u32,
    pub max_out_len: u32,
    pub max_seq_len: u32,
    pub batch_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaTemplate {
    pub round: Vec<RoleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleSpec {
    pub role: String,
    pub api_role: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub generate: bool,
}

impl MetaTemplate {
    pub fn human_bot() -> Self {
        Self {
            round: vec![
                RoleSpec {
                    role: "HUMAN".to_string(),
                    api_role: "HUMAN".to_string(),
                    generate: false,
                },
                RoleSpec {
                    role: "BOT".to_string(),
                    api_role: "BOT".to_string(),
                    generate: true,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalModel {
    pub abbr: String,
    pub path: String,
    pub tokenizer_path: String,
    pub model_kwargs: ModelKwargs,
    pub tokenizer_kwargs: TokenizerKwargs,
    pub max_out_len: u32,
    pub max_seq_len: u32,
    pub batch_size: u32,
    pub run_cfg: RunCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelKwargs {
    pub device_map: String,
    pub trust_remote_code: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenizerKwargs {
    pub padding_side: String,
    pub truncation_side: String,
    pub trust_remote_code: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunCfg {
    pub num_gpus: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summarizer {
    pub dataset_abbrs: Vec<String>,
    pub summary_groups: Vec<Value>,
}
