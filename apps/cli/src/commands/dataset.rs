//! Dataset command implementation.

use crate::commands::types::DatasetCommand;
use crate::commands::{print_outcome, AppContext};
use crate::hub::{HubClient, HubDatasetFetcher};
use anyhow::{Context, Result};
use colored::Colorize;
use experiments_cache::{split_dataset, DatasetRequest, Orchestrator, SplitOptions, StdoutProgressSink};
use std::path::Path;

pub async fn execute(command: DatasetCommand, ctx: &AppContext) -> Result<()> {
    match command {
        DatasetCommand::Download { name, output_dir, max_samples, cache_dir, force } => {
            let request = DatasetRequest::new(name, output_dir)
                .with_max_samples(max_samples)
                .with_cache_dir(cache_dir.or_else(|| ctx.settings.cache_dir.clone()))
                .forced(force);
            download(&request, ctx).await
        }
        DatasetCommand::Split { input_path, output_dir, train_ratio, val_ratio, seed, stratify } => {
            split(SplitOptions { input_path, output_dir, train_ratio, val_ratio, seed, stratify })
        }
    }
}

async fn download(request: &DatasetRequest, ctx: &AppContext) -> Result<()> {
    println!();
    println!("{}", format!("Dataset {}", request.name).bold().cyan());
    if let Some(max_samples) = request.max_samples {
        println!("  Max samples per split: {}", max_samples.to_string().cyan());
    }
    println!();

    let fetcher = HubDatasetFetcher::new(HubClient::from_settings(&ctx.settings)?);
    let orchestrator = Orchestrator::new(&ctx.store, &StdoutProgressSink);
    let outcome = orchestrator
        .download_dataset(request, &fetcher)
        .await
        .with_context(|| format!("Failed to download dataset {}", request.name))?;

    println!();
    print_outcome("Dataset", &outcome, &request.output_dir);
    println!();
    Ok(())
}

fn split(options: SplitOptions) -> Result<()> {
    let summary = split_dataset(&options)
        .with_context(|| format!("Failed to split {}", options.input_path.display()))?;

    println!();
    println!("{}", "Dataset split complete".bold().green());
    println!("  Train: {} rows -> {}", summary.train_rows.to_string().cyan(), display(&summary.train_path));
    println!("  Val:   {} rows -> {}", summary.val_rows.to_string().cyan(), display(&summary.val_path));
    println!();
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string().dimmed().to_string()
}
