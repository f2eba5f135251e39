//! Command implementations for the Model Experiments CLI.

pub mod dataset;
pub mod experiment;
pub mod model;
pub mod train;
pub mod types;

use colored::Colorize;
use experiments_cache::{MetadataStore, Outcome, Settings};
use std::path::Path;

/// Settings and the sidecar store shared by every command.
pub struct AppContext {
    pub settings: Settings,
    pub store: MetadataStore,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        let store = settings.metadata_store();
        Self { settings, store }
    }
}

/// One-line report of what a cached step did.
pub fn print_outcome(label: &str, outcome: &Outcome, dir: &Path) {
    match outcome {
        Outcome::Cached(metadata) => {
            println!("  {} {} cache hit: {}", "✓".green(), label, metadata.summary().cyan());
        }
        Outcome::Produced { miss, .. } => {
            println!("  {} {} ready {}", "✓".green(), label, format!("(cache miss: {miss})").dimmed());
        }
    }
    println!("    {}", dir.display().to_string().dimmed());
}
