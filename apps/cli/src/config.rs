//! CLI settings loading.

use anyhow::{Context, Result};
use experiments_cache::Settings;
use std::path::Path;

/// Load and merge settings.
///
/// Precedence, highest first:
/// 1. CLI arguments (handled by clap)
/// 2. Explicit `--config` file
/// 3. Local settings file (./.model-experiments.toml)
/// 4. Global settings file (~/.model-experiments/config.toml)
/// 5. Defaults
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    Settings::discover(explicit).context("Failed to load settings")
}
