//! Pipeline configuration types.
//!
//! Every field has a built-in default so an empty file (or no file at all)
//! yields the reference configuration: daily buckets, radii {0, 1}, an 80/20
//! chronological split and native motif counting.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tw_common::{ConfigKey, SECS_PER_DAY};

use crate::validate::ValidationError;

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Schema version of this configuration file.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Time bucketing parameters.
    #[serde(default)]
    pub bucket: BucketConfig,

    /// Look-around radii to generate, one sample set per radius.
    #[serde(default = "default_radii")]
    pub radii: Vec<u32>,

    /// Train/test split parameters.
    #[serde(default)]
    pub split: SplitConfig,

    /// Feature extraction parameters.
    #[serde(default)]
    pub features: FeatureConfig,

    /// Sample file format.
    #[serde(default)]
    pub output: OutputConfig,

    /// Maximum number of (class, configuration) units processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Time bucketing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Bucket duration in seconds, aligned to the UTC epoch.
    #[serde(default = "default_bucket_secs")]
    pub duration_secs: i64,
}

/// Chronological split parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of each class's samples (by chronological order) used for training.
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,
}

/// Which implementation computes motif counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorBackend {
    /// In-process motif counters.
    #[default]
    Native,
    /// External counting tools, one per motif kind.
    Command,
}

/// External command invocation.
///
/// Arguments may contain `{input}` (sample file path) and `{delta}`
/// (motif time threshold in seconds) placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Feature extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Maximum span in seconds between the first and last edge of a temporal motif.
    #[serde(default = "default_delta_secs")]
    pub delta_secs: i64,

    #[serde(default)]
    pub backend: ExtractorBackend,

    /// Per-sample timeout for external extractors.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Static motif counter (required for the command backend).
    #[serde(default)]
    pub static_command: Option<CommandSpec>,

    /// Temporal motif counter (required for the command backend).
    #[serde(default)]
    pub temporal_command: Option<CommandSpec>,
}

/// Field delimiter for persisted sample files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleDelimiter {
    #[default]
    Space,
    Comma,
}

impl SampleDelimiter {
    pub fn as_char(&self) -> char {
        match self {
            SampleDelimiter::Space => ' ',
            SampleDelimiter::Comma => ',',
        }
    }
}

/// Sample output parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub delimiter: SampleDelimiter,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_radii() -> Vec<u32> {
    vec![0, 1]
}

fn default_workers() -> usize {
    4
}

fn default_bucket_secs() -> i64 {
    SECS_PER_DAY
}

fn default_train_fraction() -> f64 {
    0.8
}

fn default_delta_secs() -> i64 {
    3_600
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            schema_version: default_schema_version(),
            bucket: BucketConfig::default(),
            radii: default_radii(),
            split: SplitConfig::default(),
            features: FeatureConfig::default(),
            output: OutputConfig::default(),
            workers: default_workers(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig {
            duration_secs: default_bucket_secs(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            train_fraction: default_train_fraction(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            delta_secs: default_delta_secs(),
            backend: ExtractorBackend::default(),
            timeout_secs: default_timeout_secs(),
            static_command: None,
            temporal_command: None,
        }
    }
}

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn detect(path: &Path) -> Result<Self, ValidationError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(ValidationError::ParseError(format!(
                "unsupported config format: {:?}",
                ext
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file, detecting the format by extension.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let format = ConfigFormat::detect(path)?;
        Self::parse_str(&content, format)
    }

    /// Parse configuration from a string in the given format.
    pub fn parse_str(content: &str, format: ConfigFormat) -> Result<Self, ValidationError> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ValidationError::ParseError(format!("Invalid YAML: {}", e)))?,
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))?,
        };
        Ok(config)
    }

    /// One configuration key per radius, in ascending radius order.
    pub fn config_keys(&self) -> Vec<ConfigKey> {
        let mut radii = self.radii.clone();
        radii.sort_unstable();
        radii.dedup();
        radii
            .into_iter()
            .map(|r| ConfigKey::new(self.bucket.duration_secs, r))
            .collect()
    }
}
