//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::pipeline::{ExtractorBackend, PipelineConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

impl From<ValidationError> for tw_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                tw_common::Error::InvalidConfigValue { field, message }
            }
            other => tw_common::Error::Config(other.to_string()),
        }
    }
}

/// Validate a pipeline configuration semantically.
pub fn validate_pipeline(config: &PipelineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.bucket.duration_secs <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "bucket.duration_secs".to_string(),
            message: format!("Must be positive, got {}", config.bucket.duration_secs),
        });
    }

    validate_radii(&config.radii)?;

    let fraction = config.split.train_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ValidationError::InvalidValue {
            field: "split.train_fraction".to_string(),
            message: format!("Must be in (0, 1), got {}", fraction),
        });
    }

    if config.features.delta_secs <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "features.delta_secs".to_string(),
            message: format!("Must be positive, got {}", config.features.delta_secs),
        });
    }

    if config.features.timeout_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "features.timeout_secs".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    if config.features.backend == ExtractorBackend::Command {
        if config.features.static_command.is_none() {
            return Err(ValidationError::MissingField(
                "features.static_command".to_string(),
            ));
        }
        if config.features.temporal_command.is_none() {
            return Err(ValidationError::MissingField(
                "features.temporal_command".to_string(),
            ));
        }
    }

    for (name, spec) in [
        ("features.static_command", &config.features.static_command),
        ("features.temporal_command", &config.features.temporal_command),
    ] {
        if let Some(spec) = spec {
            if spec.program.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: format!("{}.program", name),
                    message: "Must not be empty".to_string(),
                });
            }
        }
    }

    if config.workers == 0 {
        return Err(ValidationError::InvalidValue {
            field: "workers".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn validate_radii(radii: &[u32]) -> ValidationResult<()> {
    if radii.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "radii".to_string(),
            message: "At least one radius is required".to_string(),
        });
    }

    let mut sorted = radii.to_vec();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(ValidationError::SemanticError(format!(
            "Radii must be unique, got {:?}",
            radii
        )));
    }

    Ok(())
}
