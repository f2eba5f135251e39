use crate::request::TrainingParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Dataset,
    Model,
    Train,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Model => "model",
            Self::Train => "train",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetMetadata {
    pub name: String,
    pub max_samples: Option<u64>,
    pub splits: Vec<String>,
    pub total_samples: u64,
    pub config_hash: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelMetadata {
    pub model_name: String,
    /// Files materialized in the model directory, relative to it.
    pub files: Vec<String>,
    pub config_hash: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainMetadata {
    pub model_name: String,
    pub train_data_path: PathBuf,
    pub val_data_path: PathBuf,
    /// Nanoseconds since the UNIX epoch.
    pub train_data_mtime: u64,
    /// Nanoseconds since the UNIX epoch.
    pub val_data_mtime: u64,
    pub config_hash: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub training_params: TrainingParams,
}

/// Sidecar record stored next to an artifact, one shape per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "artifact_kind", rename_all = "snake_case")]
pub enum ArtifactMetadata {
    Dataset(DatasetMetadata),
    Model(ModelMetadata),
    Train(TrainMetadata),
}

impl ArtifactMetadata {
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Dataset(_) => ArtifactKind::Dataset,
            Self::Model(_) => ArtifactKind::Model,
            Self::Train(_) => ArtifactKind::Train,
        }
    }

    /// Dataset or model name the artifact was produced from.
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::Dataset(m) => &m.name,
            Self::Model(m) => &m.model_name,
            Self::Train(m) => &m.model_name,
        }
    }

    #[must_use]
    pub fn config_hash(&self) -> &str {
        match self {
            Self::Dataset(m) => &m.config_hash,
            Self::Model(m) => &m.config_hash,
            Self::Train(m) => &m.config_hash,
        }
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        match self {
            Self::Dataset(m) => m.completed,
            Self::Model(m) => m.completed,
            Self::Train(m) => m.completed,
        }
    }

    /// One-line description used when reporting a cached artifact.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Dataset(m) => format!(
                "dataset {} ({} samples across {})",
                m.name,
                m.total_samples,
                m.splits.join(", ")
            ),
            Self::Model(m) => format!("model {} ({} files)", m.model_name, m.files.len()),
            Self::Train(m) => format!(
                "fine-tuned {} ({} epochs, batch size {}, lr {})",
                m.model_name, m.training_params.epochs, m.training_params.batch_size, m.training_params.learning_rate
            ),
        }
    }
}
