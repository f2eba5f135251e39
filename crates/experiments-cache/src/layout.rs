//! On-disk conventions shared by the fetchers, the trainer and the validators.

use crate::metadata::ArtifactKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_METADATA_FILE: &str = ".artifact_metadata.json";

/// Data file written inside every dataset split directory.
pub const SPLIT_DATA_FILE: &str = "data.jsonl";

pub const MODEL_CONFIG_FILE: &str = "config.json";

const WEIGHT_EXTENSIONS: &[&str] = &["safetensors", "bin", "pt", "pth", "h5", "msgpack", "gguf"];

const TOKENIZER_FILES: &[&str] = &[
    "tokenizer.json",
    "tokenizer_config.json",
    "vocab.txt",
    "vocab.json",
    "merges.txt",
    "spiece.model",
    "tokenizer.model",
    "sentencepiece.bpe.model",
];

#[must_use]
pub fn split_data_path(dataset_dir: &Path, split: &str) -> PathBuf {
    dataset_dir.join(split).join(SPLIT_DATA_FILE)
}

/// Whether `file_name` looks like a model weights file.
#[must_use]
pub fn is_weights_file(file_name: &str) -> bool {
    if file_name.ends_with(".index.json") {
        return false;
    }
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_lowercase();
    if !WEIGHT_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }
    // `training_args.bin` is a pickled config, not weights.
    !stem.ends_with("training_args")
}

#[must_use]
pub fn is_tokenizer_file(file_name: &str) -> bool {
    TOKENIZER_FILES.contains(&file_name) || file_name.ends_with("tokenizer.model")
}

/// Whether `file_name` is one the model fetcher should materialize.
#[must_use]
pub fn is_model_file(file_name: &str) -> bool {
    file_name == MODEL_CONFIG_FILE
        || file_name == "generation_config.json"
        || file_name == "special_tokens_map.json"
        || file_name.ends_with(".safetensors.index.json")
        || file_name.ends_with(".bin.index.json")
        || is_weights_file(file_name)
        || is_tokenizer_file(file_name)
}

/// Names of the regular files directly inside `dir`, sorted.
///
/// Unreadable directories yield an empty list.
#[must_use]
pub fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

/// Required files missing from a downloaded model directory.
#[must_use]
pub fn missing_model_files(dir: &Path) -> Vec<String> {
    let files = list_files(dir);
    let mut missing = missing_weights_and_config(&files);
    if !files.iter().any(|f| is_tokenizer_file(f)) {
        missing.push("tokenizer".to_string());
    }
    missing
}

/// Required files missing from a fine-tuned output directory.
#[must_use]
pub fn missing_train_outputs(dir: &Path) -> Vec<String> {
    missing_weights_and_config(&list_files(dir))
}

fn missing_weights_and_config(files: &[String]) -> Vec<String> {
    let mut missing = Vec::new();
    if !files.iter().any(|f| f == MODEL_CONFIG_FILE) {
        missing.push(MODEL_CONFIG_FILE.to_string());
    }
    if !files.iter().any(|f| is_weights_file(f)) {
        missing.push("weights".to_string());
    }
    missing
}

/// `path` made absolute against the current directory, without touching the filesystem.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Modification time of `path` in nanoseconds since the UNIX epoch.
pub fn modified_nanos(path: &Path) -> std::io::Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    u64::try_from(since_epoch.as_nanos()).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Split directories whose data file is absent.
#[must_use]
pub fn missing_split_files(dataset_dir: &Path, splits: &[String]) -> Vec<String> {
    splits
        .iter()
        .filter(|split| !split_data_path(dataset_dir, split).is_file())
        .map(|split| format!("{split}/{SPLIT_DATA_FILE}"))
        .collect()
}

/// Files a produce step of `kind` writes under `dir` and the post-produce check
/// inspects. They are removed before the step runs.
#[must_use]
pub fn produced_outputs(kind: ArtifactKind, dir: &Path) -> Vec<PathBuf> {
    match kind {
        ArtifactKind::Dataset => {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return Vec::new();
            };
            let mut files: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path().join(SPLIT_DATA_FILE))
                .filter(|path| path.is_file())
                .collect();
            files.sort();
            files
        }
        ArtifactKind::Model => {
            list_files(dir).into_iter().filter(|f| is_model_file(f)).map(|f| dir.join(f)).collect()
        }
        ArtifactKind::Train => list_files(dir)
            .into_iter()
            .filter(|f| f == MODEL_CONFIG_FILE || is_weights_file(f))
            .map(|f| dir.join(f))
            .collect(),
    }
}
