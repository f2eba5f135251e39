use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request to download a dataset into `output_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRequest {
    pub name: String,
    pub output_dir: PathBuf,
    pub max_samples: Option<u64>,
    pub cache_dir: Option<PathBuf>,
    pub force: bool,
}

impl DatasetRequest {
    #[must_use]
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), output_dir: output_dir.into(), max_samples: None, cache_dir: None, force: false }
    }

    #[must_use]
    pub fn with_max_samples(mut self, max_samples: Option<u64>) -> Self {
        self.max_samples = max_samples;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    #[must_use]
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.name.trim().is_empty() {
            return Err(CacheError::InvalidRequest("dataset name is required".to_string()));
        }
        if self.max_samples == Some(0) {
            return Err(CacheError::InvalidRequest("max_samples must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Request to download a pre-trained model into `output_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub name: String,
    pub output_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub force: bool,
}

impl ModelRequest {
    #[must_use]
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), output_dir: output_dir.into(), cache_dir: None, force: false }
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    #[must_use]
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.name.trim().is_empty() {
            return Err(CacheError::InvalidRequest("model name is required".to_string()));
        }
        Ok(())
    }
}

/// Request to fine-tune `model_name` on a train/validation pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRequest {
    pub model_name: String,
    pub train_data: PathBuf,
    pub val_data: PathBuf,
    pub output_dir: PathBuf,
    pub params: TrainingParams,
    pub force: bool,
}

impl TrainRequest {
    #[must_use]
    pub fn new(
        model_name: impl Into<String>,
        train_data: impl Into<PathBuf>,
        val_data: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            train_data: train_data.into(),
            val_data: val_data.into(),
            output_dir: output_dir.into(),
            params: TrainingParams::default(),
            force: false,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: TrainingParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.model_name.trim().is_empty() {
            return Err(CacheError::InvalidRequest("model_name is required".to_string()));
        }
        self.params.validate()
    }
}

/// Every hyperparameter that affects the outcome of a training run.
///
/// All of these feed the train fingerprint; adding a field here changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub warmup_steps: u32,
    pub save_steps: u32,
    pub logging_steps: u32,
    pub eval_steps: u32,
    pub max_length: u32,
    pub gradient_accumulation_steps: u32,
    pub fp16: bool,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 3,
            batch_size: 16,
            learning_rate: 2e-5,
            warmup_steps: 100,
            save_steps: 500,
            logging_steps: 50,
            eval_steps: 250,
            max_length: 512,
            gradient_accumulation_steps: 1,
            fp16: false,
            seed: 42,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> CacheResult<()> {
        if self.epochs == 0 {
            return Err(CacheError::InvalidRequest("epochs must be >= 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(CacheError::InvalidRequest("learning_rate must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(CacheError::InvalidRequest("batch_size must be >= 1".to_string()));
        }
        if self.max_length == 0 {
            return Err(CacheError::InvalidRequest("max_length must be >= 1".to_string()));
        }
        if self.gradient_accumulation_steps == 0 {
            return Err(CacheError::InvalidRequest("gradient_accumulation_steps must be >= 1".to_string()));
        }
        Ok(())
    }
}
