//! Sidecar metadata persistence.
//!
//! One JSON record per artifact directory. Reads fail softly into
//! [`MetadataLoad::Invalid`] so callers treat every unreadable sidecar as a
//! cache miss. Writes go through a temp file in the same directory followed by
//! a rename, so a reader never observes a half-written record.
//!
//! There is no locking: a directory is assumed to have a single writer at a
//! time. Two processes producing into the same directory race, and the last
//! rename wins.

use crate::error::CacheResult;
use crate::layout::DEFAULT_METADATA_FILE;
use crate::metadata::ArtifactMetadata;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Why a sidecar could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMetadata {
    NotFound,
    Unreadable(String),
    Malformed(String),
}

impl std::fmt::Display for InvalidMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("metadata file not found"),
            Self::Unreadable(e) => write!(f, "metadata file unreadable: {e}"),
            Self::Malformed(e) => write!(f, "metadata file malformed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataLoad {
    Valid(ArtifactMetadata),
    Invalid(InvalidMetadata),
}

/// Handle over the sidecar files of artifact directories.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    file_name: String,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_FILE)
    }
}

impl MetadataStore {
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self { file_name: file_name.into() }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn metadata_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }

    pub fn load(&self, dir: &Path) -> MetadataLoad {
        let path = self.metadata_path(dir);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return MetadataLoad::Invalid(InvalidMetadata::NotFound);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "metadata read failed");
                return MetadataLoad::Invalid(InvalidMetadata::Unreadable(e.to_string()));
            }
        };

        match serde_json::from_slice::<ArtifactMetadata>(&bytes) {
            Ok(metadata) => MetadataLoad::Valid(metadata),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "metadata failed schema check");
                MetadataLoad::Invalid(InvalidMetadata::Malformed(e.to_string()))
            }
        }
    }

    /// Atomically replace the sidecar in `dir`.
    ///
    /// Must be the last write of a successful produce step.
    pub fn save(&self, dir: &Path, metadata: &ArtifactMetadata) -> CacheResult<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(metadata)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("{}.", self.file_name))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.metadata_path(dir)).map_err(|e| e.error)?;

        debug!(dir = %dir.display(), kind = %metadata.kind(), "metadata saved");
        Ok(())
    }

    /// Remove the sidecar in `dir`, if any.
    pub fn discard(&self, dir: &Path) -> CacheResult<()> {
        match std::fs::remove_file(self.metadata_path(dir)) {
            Ok(()) => {
                debug!(dir = %dir.display(), "metadata discarded");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ModelMetadata;
    use chrono::Utc;
    use tempfile::TempDir;

    fn model_metadata() -> ArtifactMetadata {
        ArtifactMetadata::Model(ModelMetadata {
            model_name: "distilbert-base-uncased".to_string(),
            files: vec!["config.json".to_string(), "model.safetensors".to_string()],
            config_hash: "deadbeef".to_string(),
            completed: true,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        assert_eq!(store.load(temp.path()), MetadataLoad::Invalid(InvalidMetadata::NotFound));
    }

    #[test]
    fn test_load_missing_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let load = store.load(&temp.path().join("never-created"));
        assert_eq!(load, MetadataLoad::Invalid(InvalidMetadata::NotFound));
    }

    #[test]
    fn test_load_malformed_json_is_invalid() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        std::fs::write(store.metadata_path(temp.path()), "{not json").unwrap();
        assert!(matches!(store.load(temp.path()), MetadataLoad::Invalid(InvalidMetadata::Malformed(_))));
    }

    #[test]
    fn test_load_wrong_shape_is_invalid() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        std::fs::write(
            store.metadata_path(temp.path()),
            r#"{"artifact_kind":"model","model_name":"x","completed":"yes"}"#,
        )
        .unwrap();
        assert!(matches!(store.load(temp.path()), MetadataLoad::Invalid(InvalidMetadata::Malformed(_))));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new("meta.json");
        let metadata = model_metadata();

        store.save(temp.path(), &metadata).unwrap();
        assert!(temp.path().join("meta.json").exists());
        assert_eq!(store.load(temp.path()), MetadataLoad::Valid(metadata));

        // No temp files are left behind.
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_discard_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        store.save(temp.path(), &model_metadata()).unwrap();

        store.discard(temp.path()).unwrap();
        store.discard(temp.path()).unwrap();
        assert_eq!(store.load(temp.path()), MetadataLoad::Invalid(InvalidMetadata::NotFound));
    }
}
