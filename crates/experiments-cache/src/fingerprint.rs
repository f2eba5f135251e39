//! Change-detection digests over the reproducibility-relevant part of a request.

use crate::metadata::ArtifactKind;
use crate::request::{DatasetRequest, ModelRequest, TrainRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Bumped whenever the set of fingerprinted fields changes, so stale sidecars miss.
const FINGERPRINT_VERSION: u32 = 1;

/// Hex SHA-256 of the canonical JSON form of a request's fingerprint fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFingerprint(pub String);

impl ConfigFingerprint {
    #[must_use]
    pub fn compute<R: Fingerprinted + ?Sized>(request: &R) -> Self {
        let envelope = json!({
            "kind": R::KIND.as_str(),
            "version": FINGERPRINT_VERSION,
            "fields": request.fingerprint_fields(),
        });

        let mut hasher = Sha256::new();
        hasher.update(to_canonical_json(&envelope).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn matches(&self, stored: &str) -> bool {
        self.0 == stored
    }
}

impl std::fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A request type that knows which of its fields decide reproducibility.
pub trait Fingerprinted {
    const KIND: ArtifactKind;

    fn fingerprint_fields(&self) -> Value;
}

impl Fingerprinted for DatasetRequest {
    const KIND: ArtifactKind = ArtifactKind::Dataset;

    fn fingerprint_fields(&self) -> Value {
        json!({ "name": self.name, "max_samples": self.max_samples })
    }
}

impl Fingerprinted for ModelRequest {
    const KIND: ArtifactKind = ArtifactKind::Model;

    fn fingerprint_fields(&self) -> Value {
        json!({ "name": self.name })
    }
}

impl Fingerprinted for TrainRequest {
    const KIND: ArtifactKind = ArtifactKind::Train;

    fn fingerprint_fields(&self) -> Value {
        json!({ "model_name": self.model_name, "training_params": self.params })
    }
}

/// Serialize with object keys sorted at every depth and no whitespace.
fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}
