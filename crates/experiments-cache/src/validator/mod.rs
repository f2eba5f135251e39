//! Cache-hit decisions.
//!
//! Every validator runs the same ordered checks and stops at the first
//! failure:
//!
//! 1. `force` on the request
//! 2. sidecar loads and is of the validator's kind
//! 3. identity (dataset or model name)
//! 4. `completed` flag
//! 5. kind-specific structure and configuration checks
//!
//! Validation never writes and never errors; I/O problems become a miss.

mod dataset;
mod model;
mod train;

pub use dataset::DatasetValidator;
pub use model::ModelValidator;
pub use train::TrainValidator;

use crate::metadata::{ArtifactKind, ArtifactMetadata};
use crate::store::{MetadataLoad, MetadataStore};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Hit(ArtifactMetadata),
    Miss(MissReason),
}

impl Verdict {
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    #[must_use]
    pub fn miss_reason(&self) -> Option<&MissReason> {
        match self {
            Self::Hit(_) => None,
            Self::Miss(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    Forced,
    NoMetadata,
    IdentityMismatch { expected: String, found: String },
    Incomplete,
    MissingFiles(Vec<String>),
    MaxSamplesChanged { stored: Option<u64>, requested: Option<u64> },
    ConfigChanged,
    MissingDependency(PathBuf),
    StaleDependency(PathBuf),
}

impl MissReason {
    /// Stable short label, independent of the details carried by the variant.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forced => "forced",
            Self::NoMetadata => "no metadata",
            Self::IdentityMismatch { .. } => "identity mismatch",
            Self::Incomplete => "incomplete",
            Self::MissingFiles(_) => "missing files",
            Self::MaxSamplesChanged { .. } => "max_samples changed",
            Self::ConfigChanged => "config changed",
            Self::MissingDependency(_) => "missing dependency",
            Self::StaleDependency(_) => "stale dependency",
        }
    }
}

impl std::fmt::Display for MissReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityMismatch { expected, found } => {
                write!(f, "{} (cached {found}, requested {expected})", self.label())
            }
            Self::MissingFiles(files) => write!(f, "{} ({})", self.label(), files.join(", ")),
            Self::MaxSamplesChanged { stored, requested } => {
                write!(f, "{} ({} -> {})", self.label(), fmt_cap(*stored), fmt_cap(*requested))
            }
            Self::MissingDependency(path) | Self::StaleDependency(path) => {
                write!(f, "{} ({})", self.label(), path.display())
            }
            _ => f.write_str(self.label()),
        }
    }
}

fn fmt_cap(cap: Option<u64>) -> String {
    cap.map_or_else(|| "all".to_string(), |n| n.to_string())
}

/// Hit/miss decision for one artifact kind.
pub trait ArtifactValidator {
    type Request;

    fn validate(&self, request: &Self::Request, dir: &Path) -> Verdict;
}

/// Steps 2 and 3 shared by every kind: load the sidecar, check its kind and identity.
fn load_for(
    store: &MetadataStore,
    dir: &Path,
    kind: ArtifactKind,
    expected_name: &str,
) -> Result<ArtifactMetadata, MissReason> {
    let metadata = match store.load(dir) {
        MetadataLoad::Valid(metadata) => metadata,
        MetadataLoad::Invalid(invalid) => {
            debug!(dir = %dir.display(), %invalid, "no usable metadata");
            return Err(MissReason::NoMetadata);
        }
    };

    if metadata.kind() != kind {
        debug!(dir = %dir.display(), found = %metadata.kind(), expected = %kind, "metadata kind mismatch");
        return Err(MissReason::NoMetadata);
    }

    if metadata.source_name() != expected_name {
        return Err(MissReason::IdentityMismatch {
            expected: expected_name.to_string(),
            found: metadata.source_name().to_string(),
        });
    }

    if !metadata.completed() {
        return Err(MissReason::Incomplete);
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display_keeps_label_prefix() {
        let reasons = [
            MissReason::Forced,
            MissReason::NoMetadata,
            MissReason::IdentityMismatch { expected: "a".to_string(), found: "b".to_string() },
            MissReason::MissingFiles(vec!["config.json".to_string()]),
            MissReason::MaxSamplesChanged { stored: Some(100), requested: None },
            MissReason::StaleDependency(PathBuf::from("train.jsonl")),
        ];
        for reason in reasons {
            assert!(reason.to_string().starts_with(reason.label()));
        }
    }

    #[test]
    fn test_max_samples_display() {
        let reason = MissReason::MaxSamplesChanged { stored: Some(100), requested: Some(200) };
        assert_eq!(reason.to_string(), "max_samples changed (100 -> 200)");
    }
}
