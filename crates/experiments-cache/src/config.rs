//! Settings file support.
//!
//! Settings are read from TOML and layered: global
//! (`~/.model-experiments/config.toml`), then local (`./.model-experiments.toml`),
//! then an explicitly named file. Later layers override earlier ones field by
//! field.

use crate::error::{CacheError, CacheResult};
use crate::layout::DEFAULT_METADATA_FILE;
use crate::store::MetadataStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const LOCAL_CONFIG_FILE: &str = ".model-experiments.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    /// Sidecar file name used in every artifact directory.
    pub metadata_file: Option<String>,
    /// Default download cache for hub fetches.
    pub cache_dir: Option<PathBuf>,
    pub hub: HubSettings,
    pub training: TrainingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    pub endpoint: String,
    pub datasets_endpoint: String,
    /// Environment variable holding the access token.
    pub token_env: String,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
            datasets_endpoint: "https://datasets-server.huggingface.co".to_string(),
            token_env: "HF_TOKEN".to_string(),
        }
    }
}

/// External program that performs the fine-tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub program: String,
    /// Arguments placed before the generated `--flag value` pairs.
    pub args: Vec<String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["-m".to_string(), "model_experiments.train_worker".to_string()],
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> CacheResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))
    }

    #[must_use]
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".model-experiments").join("config.toml"))
    }

    /// Load global and local settings, then `explicit` if given.
    ///
    /// Missing global/local files are skipped; a missing or invalid explicit
    /// file is an error, as is an invalid global/local file.
    pub fn discover(explicit: Option<&Path>) -> CacheResult<Self> {
        let mut settings = Self::default();

        let implicit = [Self::default_global_path(), Some(PathBuf::from(LOCAL_CONFIG_FILE))];
        for path in implicit.into_iter().flatten() {
            if path.is_file() {
                settings.merge(Self::load_from_file(&path)?);
            }
        }

        if let Some(path) = explicit {
            settings.merge(Self::load_from_file(path)?);
        }

        Ok(settings)
    }

    /// Overlay `other` onto `self`; values in `other` that differ from the defaults win.
    pub fn merge(&mut self, other: Self) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.metadata_file.is_some() {
            self.metadata_file = other.metadata_file;
        }
        if other.cache_dir.is_some() {
            self.cache_dir = other.cache_dir;
        }

        let hub_defaults = HubSettings::default();
        if other.hub.endpoint != hub_defaults.endpoint {
            self.hub.endpoint = other.hub.endpoint;
        }
        if other.hub.datasets_endpoint != hub_defaults.datasets_endpoint {
            self.hub.datasets_endpoint = other.hub.datasets_endpoint;
        }
        if other.hub.token_env != hub_defaults.token_env {
            self.hub.token_env = other.hub.token_env;
        }

        if other.training != TrainingSettings::default() {
            self.training = other.training;
        }
    }

    #[must_use]
    pub fn metadata_store(&self) -> MetadataStore {
        MetadataStore::new(self.metadata_file.as_deref().unwrap_or(DEFAULT_METADATA_FILE))
    }

    /// Access token for the hub, read from the configured environment variable.
    #[must_use]
    pub fn hub_token(&self) -> Option<String> {
        std::env::var(&self.hub.token_env).ok().filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_files() {
        let settings = Settings::default();
        assert_eq!(settings.metadata_store().file_name(), DEFAULT_METADATA_FILE);
        assert_eq!(settings.training.program, "python");
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
metadata_file = "meta.json"

[training]
program = "sh"
args = ["-c", "true"]
"#,
        )
        .unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.metadata_store().file_name(), "meta.json");
        assert_eq!(settings.training.args, vec!["-c", "true"]);
        assert_eq!(settings.hub, HubSettings::default());
    }

    #[test]
    fn test_merge_overrides_only_set_fields() {
        let mut base = Settings { log_level: Some("debug".to_string()), ..Settings::default() };
        let overlay = Settings {
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            hub: HubSettings { endpoint: "http://localhost:8080".to_string(), ..HubSettings::default() },
            ..Settings::default()
        };

        base.merge(overlay);
        assert_eq!(base.log_level.as_deref(), Some("debug"));
        assert_eq!(base.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(base.hub.endpoint, "http://localhost:8080");
        assert_eq!(base.hub.token_env, "HF_TOKEN");
    }

    #[test]
    fn test_invalid_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "log_level = [").unwrap();
        assert!(matches!(Settings::discover(Some(&path)), Err(CacheError::Config(_))));
    }
}
