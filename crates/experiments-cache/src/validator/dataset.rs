use super::{load_for, ArtifactValidator, MissReason, Verdict};
use crate::fingerprint::ConfigFingerprint;
use crate::layout;
use crate::metadata::{ArtifactKind, ArtifactMetadata};
use crate::request::DatasetRequest;
use crate::store::MetadataStore;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct DatasetValidator<'a> {
    store: &'a MetadataStore,
}

impl<'a> DatasetValidator<'a> {
    #[must_use]
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }
}

impl ArtifactValidator for DatasetValidator<'_> {
    type Request = DatasetRequest;

    fn validate(&self, request: &DatasetRequest, dir: &Path) -> Verdict {
        if request.force {
            return Verdict::Miss(MissReason::Forced);
        }

        let metadata = match load_for(self.store, dir, ArtifactKind::Dataset, &request.name) {
            Ok(metadata) => metadata,
            Err(reason) => return Verdict::Miss(reason),
        };
        let ArtifactMetadata::Dataset(dataset) = &metadata else {
            return Verdict::Miss(MissReason::NoMetadata);
        };

        if dataset.splits.is_empty() {
            return Verdict::Miss(MissReason::MissingFiles(vec!["splits".to_string()]));
        }
        let missing = layout::missing_split_files(dir, &dataset.splits);
        if !missing.is_empty() {
            return Verdict::Miss(MissReason::MissingFiles(missing));
        }

        // A missing cap is a value too: "all samples" never matches a capped download.
        if dataset.max_samples != request.max_samples {
            return Verdict::Miss(MissReason::MaxSamplesChanged {
                stored: dataset.max_samples,
                requested: request.max_samples,
            });
        }

        if !ConfigFingerprint::compute(request).matches(&dataset.config_hash) {
            return Verdict::Miss(MissReason::ConfigChanged);
        }

        Verdict::Hit(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DatasetMetadata;
    use chrono::Utc;
    use tempfile::TempDir;

    fn seed(dir: &Path, store: &MetadataStore, request: &DatasetRequest, splits: &[&str]) {
        for split in splits {
            std::fs::create_dir_all(dir.join(split)).unwrap();
            std::fs::write(layout::split_data_path(dir, split), "{\"text\":\"a\"}\n").unwrap();
        }
        let metadata = ArtifactMetadata::Dataset(DatasetMetadata {
            name: request.name.clone(),
            max_samples: request.max_samples,
            splits: splits.iter().map(|s| (*s).to_string()).collect(),
            total_samples: 2,
            config_hash: ConfigFingerprint::compute(request).0,
            completed: true,
            created_at: Utc::now(),
        });
        store.save(dir, &metadata).unwrap();
    }

    #[test]
    fn test_matching_dataset_is_hit() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let request = DatasetRequest::new("imdb", temp.path()).with_max_samples(Some(100));
        seed(temp.path(), &store, &request, &["train", "test"]);

        assert!(DatasetValidator::new(&store).validate(&request, temp.path()).is_hit());
    }

    #[test]
    fn test_changed_cap_is_miss() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let request = DatasetRequest::new("imdb", temp.path()).with_max_samples(Some(100));
        seed(temp.path(), &store, &request, &["train"]);

        let bigger = request.clone().with_max_samples(Some(200));
        let verdict = DatasetValidator::new(&store).validate(&bigger, temp.path());
        assert_eq!(verdict, Verdict::Miss(MissReason::MaxSamplesChanged { stored: Some(100), requested: Some(200) }));

        let uncapped = request.with_max_samples(None);
        let verdict = DatasetValidator::new(&store).validate(&uncapped, temp.path());
        assert_eq!(verdict.miss_reason().map(MissReason::label), Some("max_samples changed"));
    }

    #[test]
    fn test_missing_split_file_is_miss() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let request = DatasetRequest::new("imdb", temp.path());
        seed(temp.path(), &store, &request, &["train", "test"]);
        std::fs::remove_file(layout::split_data_path(temp.path(), "test")).unwrap();

        let verdict = DatasetValidator::new(&store).validate(&request, temp.path());
        assert_eq!(verdict, Verdict::Miss(MissReason::MissingFiles(vec!["test/data.jsonl".to_string()])));
    }

    #[test]
    fn test_other_dataset_name_is_identity_mismatch() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let request = DatasetRequest::new("imdb", temp.path());
        seed(temp.path(), &store, &request, &["train"]);

        let other = DatasetRequest::new("ag_news", temp.path());
        let verdict = DatasetValidator::new(&store).validate(&other, temp.path());
        assert_eq!(verdict.miss_reason().map(MissReason::label), Some("identity mismatch"));
    }

    #[test]
    fn test_force_skips_all_checks() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::default();
        let request = DatasetRequest::new("imdb", temp.path());
        seed(temp.path(), &store, &request, &["train"]);

        let verdict = DatasetValidator::new(&store).validate(&request.forced(true), temp.path());
        assert_eq!(verdict, Verdict::Miss(MissReason::Forced));
    }
}
