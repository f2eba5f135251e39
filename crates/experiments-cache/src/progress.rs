use crate::metadata::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    CacheHit { kind: ArtifactKind, dir: PathBuf, summary: String },
    CacheMiss { kind: ArtifactKind, dir: PathBuf, reason: String },
    Message { kind: ArtifactKind, message: String },
    Step { kind: ArtifactKind, step: u64, total: Option<u64> },
    Finished { kind: ArtifactKind, dir: PathBuf },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::CacheHit { kind, dir, summary } => {
                println!("[{kind}] cache hit: {summary} ({})", dir.display());
            }
            ProgressEvent::CacheMiss { kind, reason, .. } => println!("[{kind}] cache miss: {reason}"),
            ProgressEvent::Message { kind, message } => println!("[{kind}] {message}"),
            ProgressEvent::Step { kind, step, total } => {
                if let Some(total) = total {
                    println!("[{kind}] step {step}/{total}");
                } else {
                    println!("[{kind}] step {step}");
                }
            }
            ProgressEvent::Finished { kind, dir } => println!("[{kind}] finished: {}", dir.display()),
        }
    }
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
