use super::{load_for, ArtifactValidator, MissReason, Verdict};
use crate::fingerprint::ConfigFingerprint;
use crate::layout;
use crate::metadata::{ArtifactKind, ArtifactMetadata};
use crate::request::ModelRequest;
use crate::store::MetadataStore;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ModelValidator<'a> {
    store: &'a MetadataStore,
}

impl<'a> ModelValidator<'a> {
    #[must_use]
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }
}

impl ArtifactValidator for ModelValidator<'_> {
    type Request = ModelRequest;

    fn validate(&self, request: &ModelRequest, dir: &Path) -> Verdict {
        if request.force {
            return Verdict::Miss(MissReason::Forced);
        }

        let metadata = match load_for(self.store, dir, ArtifactKind::Model, &request.name) {
            Ok(metadata) => metadata,
            Err(reason) => return Verdict::Miss(reason),
        };

        let missing = layout::missing_model_files(dir);
        if !missing.is_empty() {
            return Verdict::Miss(MissReason::MissingFiles(missing));
        }

        // Every recorded file, so a lost shard of a sharded checkpoint misses too.
        let ArtifactMetadata::Model(model) = &metadata else {
            return Verdict::Miss(MissReason::NoMetadata);
        };
        let lost: Vec<String> = model.files.iter().filter(|file| !dir.join(file).is_file()).cloned().collect();
        if !lost.is_empty() {
            return Verdict::Miss(MissReason::MissingFiles(lost));
        }

        if !ConfigFingerprint::compute(request).matches(metadata.config_hash()) {
            return Verdict::Miss(MissReason::ConfigChanged);
        }

        Verdict::Hit(metadata)
    }
}
