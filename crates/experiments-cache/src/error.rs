use crate::metadata::ArtifactKind;
use std::path::PathBuf;
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the produce path and by request construction.
///
/// Validation never returns these: every failure on the validation path is
/// folded into a [`crate::Verdict::Miss`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("required input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("{kind} produce step failed: {message}")]
    Produce { kind: ArtifactKind, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CacheError {
    pub fn produce(kind: ArtifactKind, message: impl Into<String>) -> Self {
        Self::Produce { kind, message: message.into() }
    }
}
