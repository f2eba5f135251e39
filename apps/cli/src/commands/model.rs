//! Model command implementation.

use crate::commands::types::ModelCommand;
use crate::commands::{print_outcome, AppContext};
use crate::hub::{HubClient, HubModelFetcher};
use anyhow::{Context, Result};
use colored::Colorize;
use experiments_cache::{ModelRequest, Orchestrator, StdoutProgressSink};

pub async fn execute(command: ModelCommand, ctx: &AppContext) -> Result<()> {
    match command {
        ModelCommand::Download { name, output_dir, cache_dir, force } => {
            let request = ModelRequest::new(name, output_dir)
                .with_cache_dir(cache_dir.or_else(|| ctx.settings.cache_dir.clone()))
                .forced(force);
            download(&request, ctx).await
        }
    }
}

async fn download(request: &ModelRequest, ctx: &AppContext) -> Result<()> {
    println!();
    println!("{}", format!("Model {}", request.name).bold().cyan());
    println!();

    let fetcher = HubModelFetcher::new(HubClient::from_settings(&ctx.settings)?);
    let orchestrator = Orchestrator::new(&ctx.store, &StdoutProgressSink);
    let outcome = orchestrator
        .download_model(request, &fetcher)
        .await
        .with_context(|| format!("Failed to download model {}", request.name))?;

    println!();
    print_outcome("Model", &outcome, &request.output_dir);
    println!();
    Ok(())
}
