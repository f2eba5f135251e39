use super::{load_for, ArtifactValidator, MissReason, Verdict};
use crate::fingerprint::ConfigFingerprint;
use crate::layout;
use crate::metadata::{ArtifactKind, ArtifactMetadata};
use crate::request::TrainRequest;
use crate::store::MetadataStore;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TrainValidator<'a> {
    store: &'a MetadataStore,
}

impl<'a> TrainValidator<'a> {
    #[must_use]
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }
}

impl ArtifactValidator for TrainValidator<'_> {
    type Request = TrainRequest;

    fn validate(&self, request: &TrainRequest, dir: &Path) -> Verdict {
        if request.force {
            return Verdict::Miss(MissReason::Forced);
        }

        let metadata = match load_for(self.store, dir, ArtifactKind::Train, &request.model_name) {
            Ok(metadata) => metadata,
            Err(reason) => return Verdict::Miss(reason),
        };
        let ArtifactMetadata::Train(train) = &metadata else {
            return Verdict::Miss(MissReason::NoMetadata);
        };

        if !ConfigFingerprint::compute(request).matches(&train.config_hash) {
            return Verdict::Miss(MissReason::ConfigChanged);
        }

        let dependencies = [
            (&request.train_data, &train.train_data_path, train.train_data_mtime),
            (&request.val_data, &train.val_data_path, train.val_data_mtime),
        ];

        for (requested, stored, _) in &dependencies {
            let requested = layout::absolute_path(requested);
            if requested != **stored || !requested.is_file() {
                return Verdict::Miss(MissReason::MissingDependency(requested));
            }
        }

        for (requested, _, stored_mtime) in &dependencies {
            match layout::modified_nanos(requested) {
                Ok(current) if current == *stored_mtime => {}
                Ok(current) => {
                    debug!(path = %requested.display(), stored = stored_mtime, current, "dependency modified");
                    return Verdict::Miss(MissReason::StaleDependency(requested.to_path_buf()));
                }
                Err(e) => {
                    debug!(path = %requested.display(), error = %e, "dependency mtime unavailable");
                    return Verdict::Miss(MissReason::StaleDependency(requested.to_path_buf()));
                }
            }
        }

        let missing = layout::missing_train_outputs(dir);
        if !missing.is_empty() {
            return Verdict::Miss(MissReason::MissingFiles(missing));
        }

        Verdict::Hit(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrainMetadata;
    use crate::request::TrainingParams;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: MetadataStore,
        request: TrainRequest,
    }

    fn fixture(completed: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        let out = temp.path().join("out");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(data.join("train.jsonl"), "{\"text\":\"a\"}\n").unwrap();
        std::fs::write(data.join("val.jsonl"), "{\"text\":\"b\"}\n").unwrap();
        std::fs::write(out.join("config.json"), "{}").unwrap();
        std::fs::write(out.join("model.safetensors"), "w").unwrap();

        let params = TrainingParams { epochs: 1, batch_size: 4, seed: 42, ..TrainingParams::default() };
        let request = TrainRequest::new("m", data.join("train.jsonl"), data.join("val.jsonl"), &out).with_params(params);

        let store = MetadataStore::default();
        let metadata = ArtifactMetadata::Train(TrainMetadata {
            model_name: request.model_name.clone(),
            train_data_path: layout::absolute_path(&request.train_data),
            val_data_path: layout::absolute_path(&request.val_data),
            train_data_mtime: layout::modified_nanos(&request.train_data).unwrap(),
            val_data_mtime: layout::modified_nanos(&request.val_data).unwrap(),
            config_hash: ConfigFingerprint::compute(&request).0,
            completed,
            created_at: Utc::now(),
            training_params: request.params.clone(),
        });
        store.save(&out, &metadata).unwrap();

        Fixture { _temp: temp, store, request }
    }

    fn touch(path: &Path) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_identical_request_is_hit() {
        let f = fixture(true);
        let verdict = TrainValidator::new(&f.store).validate(&f.request, &f.request.output_dir);
        assert!(verdict.is_hit(), "{verdict:?}");
    }

    #[test]
    fn test_incomplete_run_is_miss() {
        let f = fixture(false);
        let verdict = TrainValidator::new(&f.store).validate(&f.request, &f.request.output_dir);
        assert_eq!(verdict, Verdict::Miss(MissReason::Incomplete));
    }

    #[test]
    fn test_any_hyperparameter_change_is_miss() {
        let f = fixture(true);
        let mut changed = f.request.clone();
        changed.params.epochs = 2;

        let verdict = TrainValidator::new(&f.store).validate(&changed, &changed.output_dir);
        assert_eq!(verdict, Verdict::Miss(MissReason::ConfigChanged));
    }

    #[test]
    fn test_touched_train_data_is_stale() {
        let f = fixture(true);
        touch(&f.request.train_data);

        let verdict = TrainValidator::new(&f.store).validate(&f.request, &f.request.output_dir);
        assert_eq!(verdict, Verdict::Miss(MissReason::StaleDependency(f.request.train_data.clone())));
    }

    #[test]
    fn test_touched_val_data_is_stale() {
        let f = fixture(true);
        touch(&f.request.val_data);

        let verdict = TrainValidator::new(&f.store).validate(&f.request, &f.request.output_dir);
        assert_eq!(verdict.miss_reason().map(MissReason::label), Some("stale dependency"));
    }

    #[test]
    fn test_deleted_dependency_is_missing() {
        let f = fixture(true);
        std::fs::remove_file(&f.request.val_data).unwrap();

        let verdict = TrainValidator::new(&f.store).validate(&f.request, &f.request.output_dir);
        assert_eq!(verdict.miss_reason().map(MissReason::label), Some("missing dependency"));
    }

    #[test]
    fn test_other_dependency_path_is_missing() {
        let f = fixture(true);
        let mut moved = f.request.clone();
        moved.val_data = PathBuf::from(&f.request.train_data);

        let verdict = TrainValidator::new(&f.store).validate(&moved, &moved.output_dir);
        assert_eq!(verdict.miss_reason().map(MissReason::label), Some("missing dependency"));
    }

    #[test]
    fn test_missing_outputs_is_miss() {
        let f = fixture(true);
        std::fs::remove_file(f.request.output_dir.join("model.safetensors")).unwrap();

        let verdict = TrainValidator::new(&f.store).validate(&f.request, &f.request.output_dir);
        assert_eq!(verdict, Verdict::Miss(MissReason::MissingFiles(vec!["weights".to_string()])));
    }

    #[test]
    fn test_identity_checked_before_staleness() {
        let f = fixture(true);
        touch(&f.request.train_data);
        let mut other = f.request.clone();
        other.model_name = "other".to_string();

        let verdict = TrainValidator::new(&f.store).validate(&other, &other.output_dir);
        assert_eq!(verdict.miss_reason().map(MissReason::label), Some("identity mismatch"));
    }

    #[test]
    fn test_force_wins_over_valid_entry() {
        let f = fixture(true);
        let forced = f.request.clone().forced(true);
        let verdict = TrainValidator::new(&f.store).validate(&forced, &forced.output_dir);
        assert_eq!(verdict, Verdict::Miss(MissReason::Forced));
    }
}
