//! Configuration loading for tw-core.
//!
//! Wraps `tw-config` resolution and validation:
//! - Config resolution order (CLI > env > XDG > system > defaults)
//! - Format detection and parsing (TOML, YAML, JSON)
//! - Semantic validation
//! - Config snapshot for `run.json`

pub use tw_config::validate::ValidationError;
pub use tw_config::{ConfigPaths, ConfigSnapshot, ConfigSource, PipelineConfig};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tw_config::{resolve_config, validate_pipeline};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid config file {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("Semantic validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ConfigError> for tw_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(inner) => inner.into(),
            other => tw_common::Error::Config(other.to_string()),
        }
    }
}

/// Effective configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    pub paths: ConfigPaths,
}

impl ResolvedConfig {
    /// Snapshot recorded with every run.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(&self.config, &self.paths)
    }

    pub fn is_default(&self) -> bool {
        self.paths.pipeline.is_none()
    }
}

/// Resolve, load and validate the pipeline configuration.
///
/// An explicit `cli_path` must exist; every other source silently falls
/// through to the next one.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let paths = resolve_config(cli_path);

    let config = match &paths.pipeline {
        Some(path) if !path.is_file() => {
            return Err(ConfigError::NotFound { path: path.clone() });
        }
        Some(path) => PipelineConfig::from_file(path).map_err(|source| ConfigError::Invalid {
            path: path.clone(),
            source,
        })?,
        None => PipelineConfig::default(),
    };

    validate_pipeline(&config)?;
    Ok(ResolvedConfig { config, paths })
}
