//! Experiments Cache
//!
//! Decides whether a costly step of a fine-tuning experiment can reuse what a
//! previous run left on disk:
//! - Fingerprinting the reproducibility-relevant part of a request (`ConfigFingerprint`)
//! - Reading and writing per-directory sidecar records (`MetadataStore`)
//! - Hit/miss decisions for datasets, models and training runs (`ArtifactValidator`)
//! - Running fetchers and trainers only on a miss (`Orchestrator`)

pub mod collaborator;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod layout;
pub mod metadata;
pub mod orchestrator;
pub mod profile;
pub mod progress;
pub mod request;
pub mod split;
pub mod store;
pub mod validator;

pub use collaborator::{DatasetFetcher, FetchedDataset, FetchedModel, ModelFetcher, Trainer, TrainingSummary};
pub use config::Settings;
pub use error::{CacheError, CacheResult};
pub use fingerprint::{ConfigFingerprint, Fingerprinted};
pub use metadata::{ArtifactKind, ArtifactMetadata, DatasetMetadata, ModelMetadata, TrainMetadata};
pub use orchestrator::{Orchestrator, Outcome};
pub use profile::{experiment_name, ProfileName, TrainingProfile};
pub use progress::{NullProgressSink, ProgressEvent, ProgressSink, StdoutProgressSink};
pub use request::{DatasetRequest, ModelRequest, TrainRequest, TrainingParams};
pub use split::{split_dataset, SplitOptions, SplitSummary};
pub use store::{InvalidMetadata, MetadataLoad, MetadataStore};
pub use validator::{ArtifactValidator, DatasetValidator, MissReason, ModelValidator, TrainValidator, Verdict};
