//! Model Experiments CLI - fine-tune language models without redoing finished work
//!
//! This CLI provides a `model-experiments` command that downloads datasets and
//! models, splits data and runs fine-tuning jobs, reusing any artifact a
//! previous run already produced for the same configuration.

mod commands;
mod config;
mod hub;
mod trainer;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::types::{DatasetCommand, ExperimentArgs, ModelCommand, TrainArgs};
use commands::{dataset, experiment, model, train, AppContext};

/// Model Experiments - cached dataset, model and fine-tuning steps
#[derive(Parser, Debug)]
#[command(
    name = "model-experiments",
    author,
    version,
    about = "Fine-tune and evaluate language models, reusing cached downloads and runs",
    long_about = "Every costly step records a metadata sidecar next to its output.\nRe-running a step with the same configuration reuses the existing artifact instead of redoing the work."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Settings file applied after the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dataset operations
    ///
    /// Download datasets from the hub or split a local dataset into
    /// train and validation files.
    #[command(subcommand)]
    Dataset(DatasetCommand),

    /// Model operations
    #[command(subcommand)]
    Model(ModelCommand),

    /// Fine-tune a model
    ///
    /// Skipped when the output directory already holds a completed run with
    /// the same hyperparameters and unchanged data files.
    Train(TrainArgs),

    /// Run a complete experiment
    ///
    /// Downloads the dataset and base model, then fine-tunes under a named
    /// profile. Pass --experiment-id to resume an earlier experiment.
    RunExperiment(ExperimentArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = config::load_settings(args.config.as_deref())?;

    let log_level = args.log_level.as_deref().or(settings.log_level.as_deref()).unwrap_or("info");
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = AppContext::new(settings);

    match args.command {
        Command::Dataset(command) => dataset::execute(command, &ctx).await,
        Command::Model(command) => model::execute(command, &ctx).await,
        Command::Train(train_args) => train::execute(train_args, &ctx).await,
        Command::RunExperiment(experiment_args) => experiment::execute(experiment_args, &ctx).await,
    }
}
