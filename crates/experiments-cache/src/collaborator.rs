use crate::error::CacheResult;
use crate::progress::ProgressSink;
use crate::request::{DatasetRequest, ModelRequest, TrainRequest};
use async_trait::async_trait;

/// What a dataset fetch materialized under `request.output_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDataset {
    /// Split names, each written to `<output_dir>/<split>/data.jsonl`.
    pub splits: Vec<String>,
    pub total_samples: u64,
}

/// What a model fetch materialized under `request.output_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedModel {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub train_loss: Option<f64>,
    pub eval_loss: Option<f64>,
    pub steps: Option<u64>,
}

#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    fn id(&self) -> &'static str;

    async fn fetch(&self, request: &DatasetRequest, progress: &dyn ProgressSink) -> CacheResult<FetchedDataset>;
}

#[async_trait]
pub trait ModelFetcher: Send + Sync {
    fn id(&self) -> &'static str;

    async fn fetch(&self, request: &ModelRequest, progress: &dyn ProgressSink) -> CacheResult<FetchedModel>;
}

/// Runs a fine-tuning job, writing config and weights into `request.output_dir`.
#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn train(&self, request: &TrainRequest, progress: &dyn ProgressSink) -> CacheResult<TrainingSummary>;
}
