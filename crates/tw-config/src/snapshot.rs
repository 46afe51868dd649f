//! Configuration snapshots for run reproducibility.
//!
//! A snapshot records the effective configuration of a run together with a
//! content hash, so two output trees can be checked for having been produced
//! by the same settings. Snapshots carry no wall-clock fields: identical
//! inputs and configuration produce byte-identical `run.json` files.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::pipeline::PipelineConfig;
use crate::resolve::ConfigPaths;

/// A frozen snapshot of the effective configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub config_source: String,

    /// SHA-256 of the canonical JSON encoding of the effective configuration.
    pub config_hash: String,

    /// The effective configuration.
    pub config: PipelineConfig,
}

impl ConfigSnapshot {
    /// Create a snapshot from a loaded configuration.
    pub fn new(config: &PipelineConfig, paths: &ConfigPaths) -> Self {
        let canonical = serde_json::to_string(config).unwrap_or_default();
        ConfigSnapshot {
            schema_version: config.schema_version.clone(),
            config_path: paths.pipeline.as_ref().map(|p| p.display().to_string()),
            config_source: paths.source.to_string(),
            config_hash: hash_content(&canonical),
            config: config.clone(),
        }
    }

    /// Snapshot of the built-in defaults.
    pub fn defaults_only() -> Self {
        Self::new(&PipelineConfig::default(), &ConfigPaths::default())
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot was taken from the same effective configuration.
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.config_hash == other.config_hash
    }

    /// Short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.config_hash[..12.min(self.config_hash.len())]
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
