//! End-to-end experiment: dataset, base model, fine-tuning.

use crate::commands::types::ExperimentArgs;
use crate::commands::{print_outcome, AppContext};
use crate::hub::{HubClient, HubDatasetFetcher, HubModelFetcher};
use crate::trainer::CommandTrainer;
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use experiments_cache::layout::split_data_path;
use experiments_cache::{
    experiment_name, ArtifactMetadata, DatasetRequest, ModelRequest, Orchestrator, Outcome, ProfileName, StdoutProgressSink,
    TrainRequest, TrainingProfile,
};
use serde_json::json;
use std::path::PathBuf;

const EXPERIMENT_METADATA_FILE: &str = "experiment_metadata.json";

/// Directory layout of one experiment.
struct ExperimentDirs {
    root: PathBuf,
    data: PathBuf,
    base_model: PathBuf,
    fine_tuned: PathBuf,
    cache: PathBuf,
}

impl ExperimentDirs {
    fn new(root: PathBuf) -> Self {
        Self {
            data: root.join("data"),
            base_model: root.join("models").join("base"),
            fine_tuned: root.join("models").join("fine-tuned"),
            cache: root.join("cache"),
            root,
        }
    }
}

pub async fn execute(args: ExperimentArgs, ctx: &AppContext) -> Result<()> {
    let profile_name: ProfileName = args.profile.parse()?;
    let profile = TrainingProfile::get(profile_name);

    let experiment_id = match &args.experiment_id {
        Some(id) => {
            let root = args.output_root.join(id);
            if !root.is_dir() {
                anyhow::bail!("Experiment {} not found in {}", id, args.output_root.display());
            }
            id.clone()
        }
        None => experiment_name(&args.dataset_name, &args.model_name, Local::now()),
    };
    let dirs = ExperimentDirs::new(args.output_root.join(&experiment_id));
    for dir in [&dirs.data, &dirs.base_model, &dirs.fine_tuned, &dirs.cache] {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let cache_dir = args
        .cache_dir
        .clone()
        .or_else(|| ctx.settings.cache_dir.clone())
        .unwrap_or_else(|| dirs.cache.clone());

    println!();
    println!("{}", format!("Experiment {}", experiment_id).bold().cyan());
    println!("  Dataset: {}", args.dataset_name.cyan());
    println!("  Model: {}", args.model_name.cyan());
    println!("  Profile: {} {}", profile.name.to_string().cyan(), format!("({})", profile.description).dimmed());
    println!("  Directory: {}", dirs.root.display().to_string().dimmed());
    println!();

    match run_steps(&args, &profile, &dirs, cache_dir, ctx).await {
        Ok(outcomes) => {
            let metadata = json!({
                "experiment_id": experiment_id,
                "dataset_name": args.dataset_name,
                "model_name": args.model_name,
                "profile": profile.name,
                "profile_config": profile,
                "timestamp": Local::now().to_rfc3339(),
                "directories": {
                    "data": dirs.data,
                    "base_model": dirs.base_model,
                    "fine_tuned_model": dirs.fine_tuned,
                    "cache": dirs.cache,
                },
                "steps": {
                    "dataset": step_status(&outcomes.dataset),
                    "model": step_status(&outcomes.model),
                    "train": step_status(&outcomes.train),
                },
            });
            let path = dirs.root.join(EXPERIMENT_METADATA_FILE);
            std::fs::write(&path, serde_json::to_string_pretty(&metadata)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            println!();
            println!("{}", "Experiment complete".bold().green());
            println!("  Fine-tuned model: {}", dirs.fine_tuned.display().to_string().dimmed());
            println!("  Metadata: {}", path.display().to_string().dimmed());
            let hint = format!("Re-run with --experiment-id {} to reuse finished steps.", experiment_id);
            println!("  {}", hint.dimmed());
            println!();
            Ok(())
        }
        Err(e) => {
            println!();
            println!("{}", format!("Experiment {} failed", experiment_id).bold().red());
            Err(e)
        }
    }
}

struct StepOutcomes {
    dataset: Outcome,
    model: Outcome,
    train: Outcome,
}

async fn run_steps(
    args: &ExperimentArgs,
    profile: &TrainingProfile,
    dirs: &ExperimentDirs,
    cache_dir: PathBuf,
    ctx: &AppContext,
) -> Result<StepOutcomes> {
    let hub = HubClient::from_settings(&ctx.settings)?;
    let orchestrator = Orchestrator::new(&ctx.store, &StdoutProgressSink);

    println!("{}", "[1/3] Dataset".bold());
    let dataset_request = DatasetRequest::new(args.dataset_name.clone(), dirs.data.clone())
        .with_max_samples(profile.max_samples)
        .with_cache_dir(Some(cache_dir.clone()))
        .forced(args.force);
    let dataset = orchestrator
        .download_dataset(&dataset_request, &HubDatasetFetcher::new(hub.clone()))
        .await
        .with_context(|| format!("Failed to download dataset {}", args.dataset_name))?;
    print_outcome("Dataset", &dataset, &dirs.data);
    let splits: &[String] = match dataset.metadata() {
        ArtifactMetadata::Dataset(metadata) => metadata.splits.as_slice(),
        _ => &[],
    };
    if !splits.iter().any(|s| s == "train") {
        anyhow::bail!("Dataset {} has no train split (found: {})", args.dataset_name, splits.join(", "));
    }
    let eval_split = evaluation_split(splits)?;

    println!("{}", "[2/3] Base model".bold());
    let model_request = ModelRequest::new(args.model_name.clone(), dirs.base_model.clone())
        .with_cache_dir(Some(cache_dir))
        .forced(args.force);
    let model = orchestrator
        .download_model(&model_request, &HubModelFetcher::new(hub))
        .await
        .with_context(|| format!("Failed to download model {}", args.model_name))?;
    print_outcome("Base model", &model, &dirs.base_model);

    println!("{}", "[3/3] Fine-tuning".bold());
    let train_request = TrainRequest::new(
        args.model_name.clone(),
        split_data_path(&dirs.data, "train"),
        split_data_path(&dirs.data, eval_split),
        dirs.fine_tuned.clone(),
    )
    .with_params(profile.training_params())
    .forced(args.force);
    let trainer = CommandTrainer::from_settings(&ctx.settings.training);
    let train = orchestrator
        .train(&train_request, &trainer)
        .await
        .with_context(|| format!("Training {} failed", args.model_name))?;
    print_outcome("Fine-tuned model", &train, &dirs.fine_tuned);

    Ok(StepOutcomes { dataset, model, train })
}

/// `test` when the recorded dataset has it, `validation` otherwise.
fn evaluation_split(splits: &[String]) -> Result<&'static str> {
    ["test", "validation"]
        .into_iter()
        .find(|name| splits.iter().any(|s| s == name))
        .ok_or_else(|| anyhow::anyhow!("Dataset has no test or validation split (found: {})", splits.join(", ")))
}

fn step_status(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Cached(_) => json!({ "cached": true }),
        Outcome::Produced { miss, .. } => json!({ "cached": false, "reason": miss.to_string() }),
    }
}
