//! Integration tests for the `model-experiments dataset` and `model` commands.
//!
//! Only paths that never reach the network are exercised here.

use assert_cmd::Command;
use chrono::Utc;
use experiments_cache::layout::list_files;
use experiments_cache::{ArtifactMetadata, ConfigFingerprint, MetadataStore, ModelMetadata, ModelRequest};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("model-experiments").unwrap();
    cmd.current_dir(temp_dir.path()).env("HOME", temp_dir.path());
    cmd
}

fn write_rows(path: &Path, count: usize) {
    let body: String = (0..count).map(|i| format!("{{\"text\":\"row {i}\",\"label\":{}}}\n", i % 2)).collect();
    fs::write(path, body).unwrap();
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().filter(|l| !l.trim().is_empty()).count()
}

#[test]
fn test_dataset_split_writes_both_files() {
    let temp_dir = TempDir::new().unwrap();
    write_rows(&temp_dir.path().join("rows.jsonl"), 20);

    cli(&temp_dir)
        .args(["dataset", "split", "--input-path", "rows.jsonl", "--output-dir", "split"])
        .args(["--train-ratio", "0.8", "--val-ratio", "0.2", "--stratify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dataset split complete"));

    let train = temp_dir.path().join("split/train.jsonl");
    let val = temp_dir.path().join("split/val.jsonl");
    assert_eq!(line_count(&train) + line_count(&val), 20);
    assert!(line_count(&val) > 0);
}

#[test]
fn test_dataset_split_rejects_ratios_not_summing_to_one() {
    let temp_dir = TempDir::new().unwrap();
    write_rows(&temp_dir.path().join("rows.jsonl"), 10);

    cli(&temp_dir)
        .args(["dataset", "split", "--input-path", "rows.jsonl", "--output-dir", "split"])
        .args(["--train-ratio", "0.8", "--val-ratio", "0.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sum to 1.0"));

    assert!(!temp_dir.path().join("split/train.jsonl").exists());
}

#[test]
fn test_dataset_split_missing_input_fails() {
    let temp_dir = TempDir::new().unwrap();

    cli(&temp_dir)
        .args(["dataset", "split", "--input-path", "absent.jsonl", "--output-dir", "split"])
        .args(["--train-ratio", "0.5", "--val-ratio", "0.5"])
        .assert()
        .failure();
}

#[test]
fn test_model_download_reuses_recorded_directory() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = temp_dir.path().join("base");
    fs::create_dir_all(&model_dir).unwrap();
    for file in ["config.json", "model.safetensors", "tokenizer.json"] {
        fs::write(model_dir.join(file), "{}").unwrap();
    }

    let request = ModelRequest::new("org/tiny-model", &model_dir);
    let metadata = ArtifactMetadata::Model(ModelMetadata {
        model_name: request.name.clone(),
        files: list_files(&model_dir),
        config_hash: ConfigFingerprint::compute(&request).to_string(),
        completed: true,
        created_at: Utc::now(),
    });
    MetadataStore::default().save(&model_dir, &metadata).unwrap();

    cli(&temp_dir)
        .args(["model", "download", "--name", "org/tiny-model", "--output-dir", "base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cache hit"))
        .stdout(predicate::str::contains("org/tiny-model"));
}

#[test]
fn test_custom_metadata_file_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = temp_dir.path().join("base");
    fs::create_dir_all(&model_dir).unwrap();
    for file in ["config.json", "pytorch_model.bin", "vocab.txt"] {
        fs::write(model_dir.join(file), "{}").unwrap();
    }

    let store = MetadataStore::new("model_meta.json");
    let request = ModelRequest::new("tiny", &model_dir);
    let metadata = ArtifactMetadata::Model(ModelMetadata {
        model_name: request.name.clone(),
        files: list_files(&model_dir),
        config_hash: ConfigFingerprint::compute(&request).to_string(),
        completed: true,
        created_at: Utc::now(),
    });
    store.save(&model_dir, &metadata).unwrap();

    let config = temp_dir.path().join("settings.toml");
    fs::write(&config, "metadata_file = \"model_meta.json\"\n").unwrap();

    cli(&temp_dir)
        .arg("--config")
        .arg(&config)
        .args(["model", "download", "--name", "tiny", "--output-dir", "base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cache hit"));
}

#[test]
fn test_invalid_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("settings.toml");
    fs::write(&config, "log_level = [").unwrap();

    cli(&temp_dir)
        .arg("--config")
        .arg(&config)
        .args(["model", "download", "--name", "tiny", "--output-dir", "base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));
}
