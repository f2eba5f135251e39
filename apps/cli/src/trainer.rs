//! Fine-tuning through an external training program.
//!
//! The program receives every request field twice: as `--flag value`
//! arguments and as `MODEL_EXPERIMENTS_*` environment variables. It must write
//! the model config and weights into the output directory. Each stdout line is
//! forwarded as a progress message; lines that parse as a JSON object with
//! `step`, `train_loss` or `eval_loss` also update the run summary.

use async_trait::async_trait;
use experiments_cache::config::TrainingSettings;
use experiments_cache::{
    ArtifactKind, CacheError, CacheResult, ProgressEvent, ProgressSink, TrainRequest, Trainer, TrainingSummary,
};
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

pub struct CommandTrainer {
    program: String,
    args: Vec<String>,
}

/// Structured line a training program may print.
#[derive(Debug, Default, Deserialize)]
struct TrainerReport {
    step: Option<u64>,
    total_steps: Option<u64>,
    train_loss: Option<f64>,
    eval_loss: Option<f64>,
}

impl CommandTrainer {
    pub fn from_settings(settings: &TrainingSettings) -> Self {
        Self { program: settings.program.clone(), args: settings.args.clone() }
    }

    fn flags(request: &TrainRequest) -> Vec<String> {
        let p = &request.params;
        let mut flags = vec![
            "--model-name".to_string(),
            request.model_name.clone(),
            "--train-data".to_string(),
            request.train_data.display().to_string(),
            "--val-data".to_string(),
            request.val_data.display().to_string(),
            "--output-dir".to_string(),
            request.output_dir.display().to_string(),
        ];
        let numeric = [
            ("--epochs", p.epochs.to_string()),
            ("--batch-size", p.batch_size.to_string()),
            ("--learning-rate", p.learning_rate.to_string()),
            ("--warmup-steps", p.warmup_steps.to_string()),
            ("--save-steps", p.save_steps.to_string()),
            ("--logging-steps", p.logging_steps.to_string()),
            ("--eval-steps", p.eval_steps.to_string()),
            ("--max-length", p.max_length.to_string()),
            ("--gradient-accumulation-steps", p.gradient_accumulation_steps.to_string()),
            ("--seed", p.seed.to_string()),
        ];
        for (flag, value) in numeric {
            flags.push(flag.to_string());
            flags.push(value);
        }
        if p.fp16 {
            flags.push("--fp16".to_string());
        }
        flags
    }

    fn env(request: &TrainRequest) -> CacheResult<Vec<(&'static str, String)>> {
        Ok(vec![
            ("MODEL_EXPERIMENTS_MODEL_NAME", request.model_name.clone()),
            ("MODEL_EXPERIMENTS_TRAIN_DATA", request.train_data.display().to_string()),
            ("MODEL_EXPERIMENTS_VAL_DATA", request.val_data.display().to_string()),
            ("MODEL_EXPERIMENTS_OUTPUT_DIR", request.output_dir.display().to_string()),
            ("MODEL_EXPERIMENTS_TRAINING_PARAMS", serde_json::to_string(&request.params)?),
        ])
    }
}

#[async_trait]
impl Trainer for CommandTrainer {
    fn id(&self) -> &'static str {
        "command"
    }

    async fn train(&self, request: &TrainRequest, progress: &dyn ProgressSink) -> CacheResult<TrainingSummary> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(Self::flags(request))
            .envs(Self::env(request)?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        info!(program = %self.program, output_dir = %request.output_dir.display(), "starting training program");
        let mut child = command.spawn().map_err(|e| {
            CacheError::produce(ArtifactKind::Train, format!("failed to start `{}`: {}", self.program, e))
        })?;

        let mut summary = TrainingSummary::default();
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                if let Some(report) = parse_report(&line) {
                    debug!(?report, "training report");
                    apply_report(&mut summary, &report);
                    if let Some(step) = report.step {
                        progress.on_event(ProgressEvent::Step { kind: ArtifactKind::Train, step, total: report.total_steps });
                    }
                }
                progress.on_event(ProgressEvent::Message { kind: ArtifactKind::Train, message: line });
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(CacheError::produce(ArtifactKind::Train, format!("training program exited with {status}")));
        }
        Ok(summary)
    }
}

fn parse_report(line: &str) -> Option<TrainerReport> {
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

fn apply_report(summary: &mut TrainingSummary, report: &TrainerReport) {
    if report.step.is_some() {
        summary.steps = report.step;
    }
    if report.train_loss.is_some() {
        summary.train_loss = report.train_loss;
    }
    if report.eval_loss.is_some() {
        summary.eval_loss = report.eval_loss;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use experiments_cache::{NullProgressSink, TrainingParams};
    use std::path::Path;
    use tempfile::TempDir;

    fn request(root: &Path) -> TrainRequest {
        TrainRequest::new("distilbert-base-uncased", root.join("train.jsonl"), root.join("val.jsonl"), root.join("out"))
            .with_params(TrainingParams { epochs: 2, fp16: true, ..TrainingParams::default() })
    }

    #[test]
    fn test_flags_carry_every_param() {
        let flags = CommandTrainer::flags(&request(Path::new("/data")));
        let joined = flags.join(" ");
        assert!(joined.contains("--model-name distilbert-base-uncased"));
        assert!(joined.contains("--output-dir /data/out"));
        assert!(joined.contains("--epochs 2"));
        assert!(joined.contains("--gradient-accumulation-steps 1"));
        assert!(joined.ends_with("--fp16"));
    }

    #[test]
    fn test_reports_update_summary() {
        let mut summary = TrainingSummary::default();
        assert!(parse_report("epoch 1/3").is_none());

        apply_report(&mut summary, &parse_report(r#"{"step": 10, "train_loss": 0.9}"#).unwrap());
        apply_report(&mut summary, &parse_report(r#"{"eval_loss": 0.5}"#).unwrap());
        assert_eq!(summary.steps, Some(10));
        assert_eq!(summary.train_loss, Some(0.9));
        assert_eq!(summary.eval_loss, Some(0.5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_produce_error() {
        let temp = TempDir::new().unwrap();
        let trainer = CommandTrainer {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo starting; exit 3".to_string()],
        };

        let err = trainer.train(&request(temp.path()), &NullProgressSink).await.unwrap_err();
        assert!(matches!(err, CacheError::Produce { kind: ArtifactKind::Train, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_program_sees_output_dir_env() {
        let temp = TempDir::new().unwrap();
        let request = request(temp.path());
        std::fs::create_dir_all(&request.output_dir).unwrap();
        let trainer = CommandTrainer {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"echo '{"step": 4, "eval_loss": 0.25}' > "$MODEL_EXPERIMENTS_OUTPUT_DIR/report.json"; echo '{"step": 4, "eval_loss": 0.25}'"#
                    .to_string(),
            ],
        };

        let summary = trainer.train(&request, &NullProgressSink).await.unwrap();
        assert_eq!(summary.steps, Some(4));
        assert_eq!(summary.eval_loss, Some(0.25));
        assert!(request.output_dir.join("report.json").is_file());
    }
}
