use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ids::ModelId;

/// How the engine reaches the model under evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationFamily {
    /// OpenAI-compatible HTTP endpoint.
    RemoteApi,
    /// Weights loaded from a local directory.
    LocalWeights,
}

impl InvocationFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationFamily::RemoteApi => "remote-api",
            InvocationFamily::LocalWeights => "local-weights",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "remote-api" | "api" => Some(InvocationFamily::RemoteApi),
            "local-weights" | "local" | "hf" => Some(InvocationFamily::LocalWeights),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectionParams {
    /// Local weights directory, or the remote model identifier (e.g. `gpt-4o`).
    pub path: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct ModelDescriptor {
    pub id: ModelId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub family: InvocationFamily,
    pub connection: ConnectionParams,
    pub created_at: DateTime<Utc>,
}

impl ModelDescriptor {
    pub fn new(name: String, family: InvocationFamily, connection: ConnectionParams) -> Self {
        Self {
            id: ModelId::new(),
            name,
            family,
            connection,
            created_at: Utc::now(),
        }
    }

    pub fn remote(name: impl Into<String>, model: impl Into<String>, base_url: Option<String>, api_key: Option<String>) -> Self {
        Self::new(
            name.into(),
            InvocationFamily::RemoteApi,
            ConnectionParams {
                path: model.into(),
                api_key,
                base_url,
            },
        )
    }

    pub fn local(name: impl Into<String>, weights_path: impl Into<String>) -> Self {
        Self::new(
            name.into(),
            InvocationFamily::LocalWeights,
            ConnectionParams {
                path: weights_path.into(),
                api_key: None,
                base_url: None,
            },
        )
    }
}
