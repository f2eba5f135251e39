//! Command type definitions shared between main.rs and the command modules.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum DatasetCommand {
    /// Download a dataset from the hub
    Download {
        /// Dataset name on the hub (e.g. imdb)
        #[arg(long)]
        name: String,

        /// Directory that receives one `<split>/data.jsonl` per split
        #[arg(long)]
        output_dir: PathBuf,

        /// Cap on rows downloaded per split
        #[arg(long)]
        max_samples: Option<u64>,

        /// Download cache shared across runs
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Redownload even when a cached copy matches
        #[arg(long)]
        force: bool,
    },

    /// Split a local dataset into train and validation files
    Split {
        /// JSONL file or downloaded dataset directory
        #[arg(long)]
        input_path: PathBuf,

        /// Directory that receives train.jsonl and val.jsonl
        #[arg(long)]
        output_dir: PathBuf,

        /// Fraction of rows for training
        #[arg(long)]
        train_ratio: f64,

        /// Fraction of rows for validation
        #[arg(long)]
        val_ratio: f64,

        /// Shuffle seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Keep the `label` distribution equal across both files
        #[arg(long)]
        stratify: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// Download a model from the hub
    Download {
        /// Model name on the hub (e.g. distilbert-base-uncased)
        #[arg(long)]
        name: String,

        /// Directory that receives config, weights and tokenizer files
        #[arg(long)]
        output_dir: PathBuf,

        /// Download cache shared across runs
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Redownload even when a cached copy matches
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Base model name or local model directory
    #[arg(long)]
    pub model_name: String,

    /// Training data (JSONL)
    #[arg(long)]
    pub train_data: PathBuf,

    /// Validation data (JSONL)
    #[arg(long)]
    pub val_data: PathBuf,

    /// Directory that receives the fine-tuned model
    #[arg(long)]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 3)]
    pub epochs: u32,

    #[arg(long, default_value_t = 16)]
    pub batch_size: u32,

    #[arg(long, default_value_t = 2e-5)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 100)]
    pub warmup_steps: u32,

    #[arg(long, default_value_t = 500)]
    pub save_steps: u32,

    #[arg(long, default_value_t = 50)]
    pub logging_steps: u32,

    #[arg(long, default_value_t = 250)]
    pub eval_steps: u32,

    /// Maximum tokenized sequence length
    #[arg(long, default_value_t = 512)]
    pub max_length: u32,

    #[arg(long, default_value_t = 1)]
    pub gradient_accumulation_steps: u32,

    /// Train with mixed precision
    #[arg(long)]
    pub fp16: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Retrain even when a cached run matches
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExperimentArgs {
    /// Dataset name on the hub
    #[arg(long)]
    pub dataset_name: String,

    /// Base model name on the hub
    #[arg(long)]
    pub model_name: String,

    /// Training profile (quick, default, full)
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// Directory holding all experiments
    #[arg(long, default_value = "./experiments")]
    pub output_root: PathBuf,

    /// Reuse an existing experiment instead of starting a new one
    #[arg(long)]
    pub experiment_id: Option<String>,

    /// Download cache (defaults to the experiment's cache/ directory)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Redo every step even when cached
    #[arg(long)]
    pub force: bool,
}
