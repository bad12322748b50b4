//! Deterministic identifiers — BLAKE3 digests of configurations and labels.
//!
//! - `RunId`: hash of the canonical JSON of a run configuration.
//! - `derive_seed`: stable 64-bit seed from a list of labels.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Hash any serializable configuration. Struct fields serialize in
    /// declaration order, so equal configs always produce equal ids.
    pub fn of<T: Serialize>(config: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(config)?;
        Ok(Self(blake3::hash(&json).to_hex().to_string()))
    }

    /// First 12 hex characters, for log lines and file names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable seed from labels such as `["0700.HK", "5m"]`.
pub fn derive_seed(labels: &[&str]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for label in labels {
        hasher.update(label.as_bytes());
        hasher.update(&[0]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
