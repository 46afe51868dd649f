//! Temporal windows configuration loading and validation.
//!
//! This crate provides:
//! - Typed pipeline configuration with built-in defaults
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation
//! - Deterministic config snapshots recorded with every run

pub mod pipeline;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use pipeline::{
    CommandSpec, ConfigFormat, ExtractorBackend, PipelineConfig, SampleDelimiter,
};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_pipeline, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
