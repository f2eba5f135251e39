//! Validate, then reuse or produce, then persist.
//!
//! On a miss the sidecar and the previous run's required outputs (config,
//! weights, tokenizer, split files) are removed before the collaborator runs.
//! The sidecar is only written back, with `completed: true`, once the produced
//! artifact has passed the same structural checks the validator applies. A
//! failed or interrupted produce step therefore always leaves the directory in
//! a state that misses.

use crate::collaborator::{DatasetFetcher, ModelFetcher, Trainer, TrainingSummary};
use crate::error::{CacheError, CacheResult};
use crate::fingerprint::ConfigFingerprint;
use crate::layout;
use crate::metadata::{ArtifactKind, ArtifactMetadata, DatasetMetadata, ModelMetadata, TrainMetadata};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::request::{DatasetRequest, ModelRequest, TrainRequest};
use crate::store::MetadataStore;
use crate::validator::{ArtifactValidator, DatasetValidator, MissReason, ModelValidator, TrainValidator, Verdict};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The existing artifact was reused; no collaborator ran.
    Cached(ArtifactMetadata),
    /// The collaborator ran and the artifact was recorded.
    Produced { metadata: ArtifactMetadata, miss: MissReason },
}

impl Outcome {
    #[must_use]
    pub fn metadata(&self) -> &ArtifactMetadata {
        match self {
            Self::Cached(metadata) | Self::Produced { metadata, .. } => metadata,
        }
    }

    #[must_use]
    pub fn was_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// Drives one command invocation against an explicit store handle.
pub struct Orchestrator<'a> {
    store: &'a MetadataStore,
    progress: &'a dyn ProgressSink,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(store: &'a MetadataStore, progress: &'a dyn ProgressSink) -> Self {
        Self { store, progress }
    }

    pub async fn download_dataset(
        &self,
        request: &DatasetRequest,
        fetcher: &dyn DatasetFetcher,
    ) -> CacheResult<Outcome> {
        request.validate()?;
        let dir = request.output_dir.as_path();
        let miss = match DatasetValidator::new(self.store).validate(request, dir) {
            Verdict::Hit(metadata) => return Ok(self.reuse(ArtifactKind::Dataset, dir, metadata)),
            Verdict::Miss(reason) => reason,
        };
        self.prepare(ArtifactKind::Dataset, dir, &miss)?;

        info!(fetcher = fetcher.id(), dataset = %request.name, "fetching dataset");
        let fetched = fetcher
            .fetch(request, self.progress)
            .await
            .map_err(|e| produce_failure(ArtifactKind::Dataset, e))?;

        if fetched.splits.is_empty() {
            return Err(CacheError::produce(ArtifactKind::Dataset, "fetch produced no splits"));
        }
        let missing = layout::missing_split_files(dir, &fetched.splits);
        if !missing.is_empty() {
            return Err(incomplete(ArtifactKind::Dataset, &missing));
        }

        let metadata = ArtifactMetadata::Dataset(DatasetMetadata {
            name: request.name.clone(),
            max_samples: request.max_samples,
            splits: fetched.splits,
            total_samples: fetched.total_samples,
            config_hash: ConfigFingerprint::compute(request).0,
            completed: true,
            created_at: Utc::now(),
        });
        self.commit(dir, metadata, miss)
    }

    pub async fn download_model(&self, request: &ModelRequest, fetcher: &dyn ModelFetcher) -> CacheResult<Outcome> {
        request.validate()?;
        let dir = request.output_dir.as_path();
        let miss = match ModelValidator::new(self.store).validate(request, dir) {
            Verdict::Hit(metadata) => return Ok(self.reuse(ArtifactKind::Model, dir, metadata)),
            Verdict::Miss(reason) => reason,
        };
        self.prepare(ArtifactKind::Model, dir, &miss)?;

        info!(fetcher = fetcher.id(), model = %request.name, "fetching model");
        let fetched = fetcher
            .fetch(request, self.progress)
            .await
            .map_err(|e| produce_failure(ArtifactKind::Model, e))?;

        let missing = layout::missing_model_files(dir);
        if !missing.is_empty() {
            return Err(incomplete(ArtifactKind::Model, &missing));
        }

        let metadata = ArtifactMetadata::Model(ModelMetadata {
            model_name: request.name.clone(),
            files: fetched.files,
            config_hash: ConfigFingerprint::compute(request).0,
            completed: true,
            created_at: Utc::now(),
        });
        self.commit(dir, metadata, miss)
    }

    pub async fn train(&self, request: &TrainRequest, trainer: &dyn Trainer) -> CacheResult<Outcome> {
        request.validate()?;
        for input in [&request.train_data, &request.val_data] {
            if !input.is_file() {
                return Err(CacheError::MissingInput(input.clone()));
            }
        }

        let dir = request.output_dir.as_path();
        let miss = match TrainValidator::new(self.store).validate(request, dir) {
            Verdict::Hit(metadata) => return Ok(self.reuse(ArtifactKind::Train, dir, metadata)),
            Verdict::Miss(reason) => reason,
        };
        self.prepare(ArtifactKind::Train, dir, &miss)?;

        // Captured before training so an edit made while it runs still invalidates.
        let train_data_mtime = layout::modified_nanos(&request.train_data)?;
        let val_data_mtime = layout::modified_nanos(&request.val_data)?;

        info!(trainer = trainer.id(), model = %request.model_name, epochs = request.params.epochs, "training");
        let summary: TrainingSummary = trainer
            .train(request, self.progress)
            .await
            .map_err(|e| produce_failure(ArtifactKind::Train, e))?;

        let missing = layout::missing_train_outputs(dir);
        if !missing.is_empty() {
            return Err(incomplete(ArtifactKind::Train, &missing));
        }
        if let Some(loss) = summary.eval_loss {
            info!(eval_loss = loss, "training finished");
        }

        let metadata = ArtifactMetadata::Train(TrainMetadata {
            model_name: request.model_name.clone(),
            train_data_path: layout::absolute_path(&request.train_data),
            val_data_path: layout::absolute_path(&request.val_data),
            train_data_mtime,
            val_data_mtime,
            config_hash: ConfigFingerprint::compute(request).0,
            completed: true,
            created_at: Utc::now(),
            training_params: request.params.clone(),
        });
        self.commit(dir, metadata, miss)
    }

    fn reuse(&self, kind: ArtifactKind, dir: &Path, metadata: ArtifactMetadata) -> Outcome {
        let summary = metadata.summary();
        info!(%kind, dir = %dir.display(), %summary, "cache hit, skipping");
        self.progress.on_event(ProgressEvent::CacheHit { kind, dir: dir.to_path_buf(), summary });
        Outcome::Cached(metadata)
    }

    fn prepare(&self, kind: ArtifactKind, dir: &Path, reason: &MissReason) -> CacheResult<()> {
        info!(%kind, dir = %dir.display(), %reason, "cache miss");
        self.progress.on_event(ProgressEvent::CacheMiss {
            kind,
            dir: dir.to_path_buf(),
            reason: reason.to_string(),
        });
        self.store.discard(dir)?;
        for stale in layout::produced_outputs(kind, dir) {
            match std::fs::remove_file(&stale) {
                Ok(()) => debug!(path = %stale.display(), "removed previous output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        std::fs::create_dir_all(dir)?;
        Ok(())
    }

    fn commit(&self, dir: &Path, metadata: ArtifactMetadata, miss: MissReason) -> CacheResult<Outcome> {
        self.store.save(dir, &metadata)?;
        self.progress.on_event(ProgressEvent::Finished { kind: metadata.kind(), dir: dir.to_path_buf() });
        Ok(Outcome::Produced { metadata, miss })
    }
}

fn produce_failure(kind: ArtifactKind, error: CacheError) -> CacheError {
    warn!(%kind, %error, "produce step failed");
    if matches!(error, CacheError::Produce { .. }) {
        error
    } else {
        CacheError::produce(kind, error.to_string())
    }
}

fn incomplete(kind: ArtifactKind, missing: &[String]) -> CacheError {
    warn!(%kind, missing = ?missing, "produced artifact is incomplete");
    CacheError::produce(kind, format!("artifact incomplete after produce step, missing: {}", missing.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgressSink;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailingFetcher;

    #[async_trait]
    impl ModelFetcher for FailingFetcher {
        fn id(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, request: &ModelRequest, _progress: &dyn ProgressSink) -> CacheResult<crate::FetchedModel> {
            // Half of a download lands before the failure.
            std::fs::write(request.output_dir.join("config.json"), "{}")?;
            Err(CacheError::Other(anyhow::anyhow!("connection reset")))
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_metadata() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let orchestrator = Orchestrator::new(&store, &NullProgressSink);
        let request = ModelRequest::new("bert-base-uncased", temp.path().join("model"));

        let err = orchestrator.download_model(&request, &FailingFetcher).await.unwrap_err();
        assert!(matches!(err, CacheError::Produce { kind: ArtifactKind::Model, .. }));
        assert!(err.to_string().contains("connection reset"));
        assert!(!store.metadata_path(&request.output_dir).exists());
    }

    #[tokio::test]
    async fn test_missing_train_input_is_reported_before_training() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let orchestrator = Orchestrator::new(&store, &NullProgressSink);
        let request = TrainRequest::new("m", temp.path().join("nope.jsonl"), temp.path().join("val.jsonl"), temp.path());

        struct Unreachable;

        #[async_trait]
        impl Trainer for Unreachable {
            fn id(&self) -> &'static str {
                "unreachable"
            }

            async fn train(&self, _: &TrainRequest, _: &dyn ProgressSink) -> CacheResult<TrainingSummary> {
                panic!("trainer must not run without inputs");
            }
        }

        let err = orchestrator.train(&request, &Unreachable).await.unwrap_err();
        assert!(matches!(err, CacheError::MissingInput(_)));
    }
}
