//! Named hyperparameter profiles for end-to-end experiments.

use crate::error::{CacheError, CacheResult};
use crate::request::TrainingParams;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileName {
    Quick,
    Default,
    Full,
}

impl ProfileName {
    pub const ALL: [Self; 3] = [Self::Quick, Self::Default, Self::Full];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Default => "default",
            Self::Full => "full",
        }
    }
}

impl std::str::FromStr for ProfileName {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or_else(|| {
            let names: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
            CacheError::InvalidRequest(format!("invalid profile '{s}'. Must be one of: {}", names.join(", ")))
        })
    }
}

impl std::fmt::Display for ProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProfile {
    pub name: ProfileName,
    pub description: String,
    /// `None` downloads every sample.
    pub max_samples: Option<u64>,
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub warmup_steps: u32,
    pub save_steps: u32,
    pub logging_steps: u32,
    pub eval_steps: u32,
}

impl TrainingProfile {
    #[must_use]
    pub fn get(name: ProfileName) -> Self {
        let (description, max_samples, epochs, batch_size, warmup_steps, save_steps, logging_steps, eval_steps) =
            match name {
                ProfileName::Quick => ("Fast testing profile with minimal samples", Some(100), 1, 32, 50, 500, 50, 250),
                ProfileName::Default => {
                    ("Balanced training profile for typical experiments", Some(1000), 3, 16, 100, 500, 50, 250)
                }
                ProfileName::Full => ("Complete training with all available data", None, 5, 8, 200, 1000, 100, 500),
            };

        Self {
            name,
            description: description.to_string(),
            max_samples,
            epochs,
            batch_size,
            learning_rate: 2e-5,
            warmup_steps,
            save_steps,
            logging_steps,
            eval_steps,
        }
    }

    /// Training parameters for an experiment run under this profile.
    #[must_use]
    pub fn training_params(&self) -> TrainingParams {
        TrainingParams {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            warmup_steps: self.warmup_steps,
            save_steps: self.save_steps,
            logging_steps: self.logging_steps,
            eval_steps: self.eval_steps,
            max_length: 512,
            gradient_accumulation_steps: 2,
            fp16: false,
            seed: 42,
        }
    }
}

/// `exp_<YYYYMMDD_HHMMSS>_<dataset>_<model_short>`, safe to use as a directory name.
#[must_use]
pub fn experiment_name(dataset_name: &str, model_name: &str, at: DateTime<Local>) -> String {
    let model_short = model_name.rsplit('/').next().unwrap_or(model_name);
    format!(
        "exp_{}_{}_{}",
        at.format("%Y%m%d_%H%M%S"),
        sanitize(dataset_name),
        sanitize(model_short)
    )
}

fn sanitize(name: &str) -> String {
    name.replace(['/', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_profile_parse() {
        assert_eq!("quick".parse::<ProfileName>().unwrap(), ProfileName::Quick);
        let err = "turbo".parse::<ProfileName>().unwrap_err();
        assert!(err.to_string().contains("quick, default, full"));
    }

    #[test]
    fn test_profiles_match_table() {
        let quick = TrainingProfile::get(ProfileName::Quick);
        assert_eq!((quick.max_samples, quick.epochs, quick.batch_size), (Some(100), 1, 32));

        let full = TrainingProfile::get(ProfileName::Full);
        assert_eq!(full.max_samples, None);
        assert_eq!(full.training_params().gradient_accumulation_steps, 2);
    }

    #[test]
    fn test_experiment_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            experiment_name("stanford nlp/imdb", "prajjwal1/bert-tiny", at),
            "exp_20240309_140507_stanford_nlp_imdb_bert-tiny"
        );
    }
}
