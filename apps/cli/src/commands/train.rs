//! Training command implementation.

use crate::commands::types::TrainArgs;
use crate::commands::{print_outcome, AppContext};
use crate::trainer::CommandTrainer;
use anyhow::{Context, Result};
use colored::Colorize;
use experiments_cache::{Orchestrator, StdoutProgressSink, TrainRequest, TrainingParams};

pub async fn execute(args: TrainArgs, ctx: &AppContext) -> Result<()> {
    let params = TrainingParams {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        warmup_steps: args.warmup_steps,
        save_steps: args.save_steps,
        logging_steps: args.logging_steps,
        eval_steps: args.eval_steps,
        max_length: args.max_length,
        gradient_accumulation_steps: args.gradient_accumulation_steps,
        fp16: args.fp16,
        seed: args.seed,
    };
    let request = TrainRequest::new(args.model_name, args.train_data, args.val_data, args.output_dir)
        .with_params(params)
        .forced(args.force);

    println!();
    println!("{}", "Training Configuration".bold().cyan());
    println!("  Model: {}", request.model_name.cyan());
    println!("  Train data: {}", request.train_data.display().to_string().dimmed());
    println!("  Val data: {}", request.val_data.display().to_string().dimmed());
    println!("  Output: {}", request.output_dir.display().to_string().dimmed());
    println!(
        "  Epochs: {}  Batch size: {}  Learning rate: {}",
        request.params.epochs, request.params.batch_size, request.params.learning_rate
    );
    println!();

    let trainer = CommandTrainer::from_settings(&ctx.settings.training);
    let outcome = Orchestrator::new(&ctx.store, &StdoutProgressSink)
        .train(&request, &trainer)
        .await
        .with_context(|| format!("Training {} failed", request.model_name))?;

    println!();
    print_outcome("Fine-tuned model", &outcome, &request.output_dir);
    println!();
    Ok(())
}
