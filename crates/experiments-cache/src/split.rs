//! Seeded train/validation split of a downloaded dataset.

use crate::error::{CacheError, CacheResult};
use crate::layout::{self, SPLIT_DATA_FILE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TRAIN_FILE: &str = "train.jsonl";
pub const VAL_FILE: &str = "val.jsonl";

const RATIO_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// A JSONL file, or a dataset directory of `<split>/data.jsonl` files.
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub seed: u64,
    /// Split each `label` group separately so both sides keep the class mix.
    pub stratify: bool,
}

impl SplitOptions {
    pub fn validate(&self) -> CacheResult<()> {
        let in_range = |r: f64| r > 0.0 && r < 1.0;
        if !in_range(self.train_ratio) || !in_range(self.val_ratio) {
            return Err(CacheError::InvalidRequest("ratios must be between 0 and 1".to_string()));
        }
        if ((self.train_ratio + self.val_ratio) - 1.0).abs() > RATIO_TOLERANCE {
            return Err(CacheError::InvalidRequest(
                "train and validation ratios must sum to 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub val_rows: usize,
    pub train_path: PathBuf,
    pub val_path: PathBuf,
}

pub fn split_dataset(options: &SplitOptions) -> CacheResult<SplitSummary> {
    options.validate()?;

    let rows = read_input(&options.input_path)?;
    if rows.len() < 2 {
        return Err(CacheError::Dataset(format!(
            "need at least 2 rows to split, found {}",
            rows.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let groups = if options.stratify { group_by_label(rows) } else { vec![rows] };

    let mut train = Vec::new();
    let mut val = Vec::new();
    for mut group in groups {
        group.shuffle(&mut rng);
        let cut = train_len(group.len(), options.train_ratio);
        val.extend(group.split_off(cut));
        train.extend(group);
    }

    if train.is_empty() || val.is_empty() {
        return Err(CacheError::Dataset("split left one side empty; adjust the ratios".to_string()));
    }
    // Stratified groups arrive in label order.
    train.shuffle(&mut rng);
    val.shuffle(&mut rng);

    std::fs::create_dir_all(&options.output_dir)?;
    let train_path = options.output_dir.join(TRAIN_FILE);
    let val_path = options.output_dir.join(VAL_FILE);
    write_jsonl(&train_path, &train)?;
    write_jsonl(&val_path, &val)?;

    info!(train = train.len(), val = val.len(), output = %options.output_dir.display(), "dataset split written");
    Ok(SplitSummary { train_rows: train.len(), val_rows: val.len(), train_path, val_path })
}

fn train_len(n: usize, ratio: f64) -> usize {
    #[allow(clippy::cast_precision_loss)]
    let cut = (n as f64 * ratio).round() as usize;
    cut.min(n)
}

fn group_by_label(rows: Vec<Value>) -> Vec<Vec<Value>> {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for row in rows {
        let label = row.get("label").map_or_else(|| "null".to_string(), Value::to_string);
        groups.entry(label).or_default().push(row);
    }
    debug!(labels = groups.len(), "stratifying by label");
    groups.into_values().collect()
}

fn read_input(path: &Path) -> CacheResult<Vec<Value>> {
    if path.is_file() {
        return read_jsonl(path);
    }
    if !path.is_dir() {
        return Err(CacheError::MissingInput(path.to_path_buf()));
    }

    let mut split_dirs: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|dir| dir.join(SPLIT_DATA_FILE).is_file())
        .collect();
    split_dirs.sort();

    if split_dirs.is_empty() {
        return Err(CacheError::Dataset(format!(
            "no <split>/{SPLIT_DATA_FILE} files under {}",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for dir in split_dirs {
        let name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        rows.extend(read_jsonl(&layout::split_data_path(path, &name))?);
    }
    Ok(rows)
}

pub fn read_jsonl(path: &Path) -> CacheResult<Vec<Value>> {
    let contents = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: Value = serde_json::from_str(line).map_err(|e| {
            CacheError::Dataset(format!("{}: failed to parse line {}: {}", path.display(), idx + 1, e))
        })?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn write_jsonl(path: &Path, rows: &[Value]) -> CacheResult<()> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}
