//! Configuration Assembler: turns a model descriptor and the task's
//! configuration snapshots into one engine artifact.
//!
//! Assembly is a pure function of its inputs apart from reading official
//! definition files. Host capability arrives as a [`DeviceProfile`].

pub mod engine_config;
mod loader;
pub mod shapes;

use llm_eval_core::{
    ConfigSnapshot, CoreError, DatasetConfig, DatasetConfigId, FileReference, InvocationFamily,
    ModelDescriptor, Result, TaskId,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::device::DeviceProfile;
pub use engine_config::*;
pub use loader::{LOADER_FILE_NAME, LOADER_MODULE};

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1/chat/completions";

pub struct AssemblyInput<'a> {
    pub task_id: TaskId,
    pub model: &'a ModelDescriptor,
    pub datasets: &'a [ConfigSnapshot],
    pub device: DeviceProfile,
    pub work_dir: &'a Path,
}

/// Result of a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembledConfig {
    pub task_id: TaskId,
    pub config: EngineConfig,
    /// Dataset key written into the artifact, mapped back to its configuration.
    pub abbr_map: HashMap<String, DatasetConfigId>,
    /// Configurations that contributed no dataset entry.
    pub skipped: Vec<DatasetConfigId>,
}

impl AssembledConfig {
    /// Column the engine names after the evaluated model.
    pub fn model_abbr(&self) -> Option<&str> {
        self.config.models.first().map(ModelEntry::abbr)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigAssembler {
    official_root: PathBuf,
}

impl ConfigAssembler {
    pub fn new(official_root: impl Into<PathBuf>) -> Self {
        Self {
            official_root: official_root.into(),
        }
    }

    /// Unique dataset key for one configuration.
    pub fn dataset_key(config: &DatasetConfig) -> String {
        format!("{}-{}", shapes::slug(&config.name), config.id.short())
    }

    pub fn build(&self, input: AssemblyInput<'_>) -> Result<AssembledConfig> {
        let mut datasets = Vec::new();
        let mut abbr_map = HashMap::new();
        let mut skipped = Vec::new();

        for snapshot in input.datasets {
            let config = &snapshot.config;
            let entries = match &config.file_ref {
                FileReference::Path(path) => private_entry(config, path).map(|e| vec![e]),
                FileReference::Official(target) => self.official_entries(config, target),
            };
            match entries {
                Ok(entries) if !entries.is_empty() => {
                    for entry in entries {
                        if let Some(abbr) = entry.abbr() {
                            abbr_map.insert(abbr.to_string(), config.id);
                        }
                        datasets.push(entry);
                    }
                }
                Ok(_) => {
                    error!(task_id = %input.task_id, config_id = %config.id, "Official definition declares no datasets, skipping");
                    skipped.push(config.id);
                }
                Err(e) => {
                    error!(task_id = %input.task_id, config_id = %config.id, error = %e, "Failed to assemble dataset, skipping");
                    skipped.push(config.id);
                }
            }
        }

        if datasets.is_empty() {
            return Err(CoreError::Assembly(format!(
                "none of the {} dataset configurations could be assembled",
                input.datasets.len()
            )));
        }

        let dataset_abbrs = datasets
            .iter()
            .filter_map(|d| d.abbr().map(str::to_string))
            .collect();

        let config = EngineConfig {
            custom_imports: vec![LOADER_MODULE.to_string()],
            datasets,
            models: vec![model_entry(input.model, input.device)],
            summarizer: Summarizer {
                dataset_abbrs,
                summary_groups: Vec::new(),
            },
            work_dir: input.work_dir.to_string_lossy().into_owned(),
        };

        info!(
            task_id = %input.task_id,
            datasets = config.datasets.len(),
            skipped = skipped.len(),
            "Assembled engine configuration"
        );

        Ok(AssembledConfig {
            task_id: input.task_id,
            config,
            abbr_map,
            skipped,
        })
    }

    /// Writes the artifact and the loader module into `workspace`, returning
    /// the artifact path.
    pub async fn write(&self, assembled: &AssembledConfig, workspace: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(workspace).await?;

        let artifact = workspace.join(format!("task_{}_config.json", assembled.task_id));
        let body = serde_json::to_string_pretty(&assembled.config)?;
        tokio::fs::write(&artifact, body).await?;
        tokio::fs::write(workspace.join(LOADER_FILE_NAME), loader::LOADER_SOURCE).await?;

        debug!(path = %artifact.display(), "Wrote engine artifact");
        Ok(artifact)
    }

    fn official_entries(&self, config: &DatasetConfig, target: &str) -> Result<Vec<DatasetEntry>> {
        let path = self.official_root.join(target);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            CoreError::Assembly(format!("cannot read official definition {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let document: Value = match extension.as_deref() {
            Some("json") => serde_json::from_str(&text)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .map_err(|e| CoreError::Serialization(e.to_string()))?,
            _ => {
                return Err(CoreError::Assembly(format!(
                    "unsupported official definition format: {}",
                    path.display()
                )))
            }
        };

        let declared = document
            .get("datasets")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CoreError::Assembly(format!("{} does not declare a datasets list", path.display()))
            })?;

        let key = Self::dataset_key(config);
        let single = declared.len() == 1;
        Ok(declared
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let mut map = entry.as_object()?.clone();
                let abbr = if single { key.clone() } else { format!("{}_{}", key, i) };
                map.insert("abbr".to_string(), Value::String(abbr));
                Some(DatasetEntry::Official(map))
            })
            .collect())
    }
}

fn private_entry(config: &DatasetConfig, path: &Path) -> Result<DatasetEntry> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(DatasetEntry::Private(PrivateDataset {
        abbr: ConfigAssembler::dataset_key(config),
        loader: LoaderKind::SimpleJsonlDataset,
        path: path.to_string_lossy().into_owned(),
        reader_cfg: shapes::reader_cfg(config),
        infer_cfg: shapes::infer_cfg(config),
        eval_cfg: shapes::eval_cfg(config),
    }))
}

fn model_entry(model: &ModelDescriptor, device: DeviceProfile) -> ModelEntry {
    let conn = &model.connection;
    match model.family {
        InvocationFamily::RemoteApi => ModelEntry::OpenAi(RemoteModel {
            abbr: model.name.clone(),
            path: conn.path.clone(),
            key: conn.api_key.clone().unwrap_or_default(),
            openai_api_base: conn
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string()),
            meta_template: MetaTemplate::human_bot(),
            query_per_second: 1,
            max_out_len: 2048,
            max_seq_len: 4096,
            batch_size: 1,
        }),
        InvocationFamily::LocalWeights => ModelEntry::HuggingFaceCausalLm(LocalModel {
            abbr: model.name.clone(),
            path: conn.path.clone(),
            tokenizer_path: conn.path.clone(),
            model_kwargs: ModelKwargs {
                device_map: device.device_map().to_string(),
                trust_remote_code: true,
            },
            tokenizer_kwargs: TokenizerKwargs {
                padding_side: "left".to_string(),
                truncation_side: "left".to_string(),
                trust_remote_code: true,
            },
            max_out_len: device.max_out_len(),
            max_seq_len: 2048,
            batch_size: device.batch_size(),
            run_cfg: RunCfg {
                num_gpus: device.num_gpus(),
            },
        }),
    }
}
