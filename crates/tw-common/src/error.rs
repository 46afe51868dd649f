//! Error types for Temporal Windows.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Unsorted Input
//!   Reason: edge 17 at t=1609459100 precedes previous edge at t=1609459200
//!   Fix: Sort the edge file by timestamp before running 'tw-core generate'.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 30,
//!   "category": "windowing",
//!   "message": "input not sorted: edge 17 at t=1609459100 precedes ...",
//!   "recoverable": false,
//!   "suggested_action": "fix_input",
//!   "context": { "position": 17 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Temporal Windows operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and parameter errors.
    Config,
    /// Edge list parsing and class discovery errors.
    Input,
    /// Bucketing and window generation errors.
    Windowing,
    /// Feature extraction and merge errors.
    Features,
    /// Sample and table persistence errors.
    Storage,
    /// Low-level I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Windowing => write!(f, "windowing"),
            ErrorCategory::Features => write!(f, "features"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for automation to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Re-run the failed unit of work; outputs are regenerated idempotently.
    Rerun,
    /// Fix the configuration and re-run.
    FixConfig,
    /// Fix the upstream edge data and re-run.
    FixInput,
    /// Re-run an earlier stage (e.g. `generate` before `extract`).
    RunEarlierStage,
    /// Free disk space or fix permissions.
    CheckStorage,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Rerun => write!(f, "rerun"),
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::RunEarlierStage => write!(f, "run_earlier_stage"),
            SuggestedAction::CheckStorage => write!(f, "check_storage"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for Temporal Windows.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidConfigValue { field: String, message: String },

    // Input errors (20-29)
    #[error("{path}:{line}: {message}")]
    InvalidInput {
        path: String,
        line: usize,
        message: String,
    },

    #[error("invalid class label: {0:?}")]
    InvalidLabel(String),

    #[error("no input edge files found in {0}")]
    NoInputs(String),

    // Windowing errors (30-39)
    #[error("input not sorted: edge {position} at t={timestamp} precedes previous edge at t={previous}")]
    UnsortedInput {
        position: usize,
        timestamp: i64,
        previous: i64,
    },

    #[error("timestamp {timestamp} has no representable {bucket_secs}s bucket boundary")]
    TimestampOutOfRange { timestamp: i64, bucket_secs: i64 },

    // Feature errors (40-49)
    #[error("feature arity mismatch for sample {sample} ({kind}): expected {expected}, got {actual}")]
    FeatureArityMismatch {
        sample: String,
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("feature extraction failed for sample {sample}: {message}")]
    Extraction { sample: String, message: String },

    #[error("feature extractor timed out after {seconds}s on sample {sample}")]
    ExtractorTimeout { sample: String, seconds: u64 },

    // Storage errors (50-59)
    #[error("failed to write {class}/{config}{}: {source}", .index.map(|i| format!(" sample {i}")).unwrap_or_default())]
    StorageWrite {
        class: String,
        config: String,
        index: Option<u64>,
        #[source]
        source: std::io::Error,
    },

    #[error("sample set not found: {path}")]
    SampleSetNotFound { path: String },

    #[error("sample manifest corrupted: {0}")]
    ManifestCorrupted(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Input errors
    /// - 30-39: Windowing errors
    /// - 40-49: Feature errors
    /// - 50-59: Storage errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfigValue { .. } => 11,
            Error::InvalidInput { .. } => 20,
            Error::InvalidLabel(_) => 21,
            Error::NoInputs(_) => 22,
            Error::UnsortedInput { .. } => 30,
            Error::TimestampOutOfRange { .. } => 31,
            Error::FeatureArityMismatch { .. } => 40,
            Error::Extraction { .. } => 41,
            Error::ExtractorTimeout { .. } => 42,
            Error::StorageWrite { .. } => 50,
            Error::SampleSetNotFound { .. } => 51,
            Error::ManifestCorrupted(_) => 52,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfigValue { .. } => ErrorCategory::Config,

            Error::InvalidInput { .. } | Error::InvalidLabel(_) | Error::NoInputs(_) => {
                ErrorCategory::Input
            }

            Error::UnsortedInput { .. } | Error::TimestampOutOfRange { .. } => {
                ErrorCategory::Windowing
            }

            Error::FeatureArityMismatch { .. }
            | Error::Extraction { .. }
            | Error::ExtractorTimeout { .. } => ErrorCategory::Features,

            Error::StorageWrite { .. }
            | Error::SampleSetNotFound { .. }
            | Error::ManifestCorrupted(_) => ErrorCategory::Storage,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether re-running the failed unit could succeed without
    /// changing inputs or configuration.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfigValue { .. } => false,

            Error::InvalidInput { .. } | Error::InvalidLabel(_) | Error::NoInputs(_) => false,

            // Upstream data-preparation defect
            Error::UnsortedInput { .. } | Error::TimestampOutOfRange { .. } => false,

            Error::FeatureArityMismatch { .. } => false,
            Error::Extraction { .. } => true,
            Error::ExtractorTimeout { .. } => true,

            Error::StorageWrite { .. } => true,
            Error::SampleSetNotFound { .. } => true,
            Error::ManifestCorrupted(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfigValue { .. } => SuggestedAction::FixConfig,

            Error::InvalidInput { .. } | Error::InvalidLabel(_) | Error::NoInputs(_) => {
                SuggestedAction::FixInput
            }

            Error::UnsortedInput { .. } | Error::TimestampOutOfRange { .. } => {
                SuggestedAction::FixInput
            }

            Error::FeatureArityMismatch { .. } => SuggestedAction::ManualIntervention,
            Error::Extraction { .. } => SuggestedAction::Rerun,
            Error::ExtractorTimeout { .. } => SuggestedAction::FixConfig,

            Error::StorageWrite { .. } => SuggestedAction::CheckStorage,
            Error::SampleSetNotFound { .. } => SuggestedAction::RunEarlierStage,
            Error::ManifestCorrupted(_) => SuggestedAction::Rerun,

            Error::Io(_) => SuggestedAction::CheckStorage,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Run 'tw-core config validate' and fix the reported field.",
            Error::InvalidConfigValue { .. } => {
                "Correct the named field in the pipeline config, or remove it to use the default."
            }

            Error::InvalidInput { .. } => {
                "Each line must be 'source target timestamp' (whitespace or comma separated, epoch seconds)."
            }
            Error::InvalidLabel(_) => {
                "Rename the input file so its stem uses only letters, digits, '.', '_' or '-'."
            }
            Error::NoInputs(_) => {
                "Point --input at a directory containing one edge file (.txt, .csv, .edges) per class."
            }

            Error::UnsortedInput { .. } => {
                "Sort the edge file by timestamp before running 'tw-core generate'."
            }
            Error::TimestampOutOfRange { .. } => {
                "Drop edges with timestamps near the i64 minimum; they cannot be aligned to a bucket."
            }

            Error::FeatureArityMismatch { .. } => {
                "The feature extractor returned a vector of the wrong length. Check the extractor version."
            }
            Error::Extraction { .. } => {
                "Check the extractor command and its stderr, then re-run 'tw-core extract'."
            }
            Error::ExtractorTimeout { .. } => {
                "Increase features.timeout_secs or lower features.delta_secs for dense samples."
            }

            Error::StorageWrite { .. } => {
                "Check disk space and permissions on the output directory, then re-run the unit."
            }
            Error::SampleSetNotFound { .. } => {
                "Run 'tw-core generate' (and 'tw-core extract') for this configuration first."
            }
            Error::ManifestCorrupted(_) => {
                "Delete the unit directory and re-run 'tw-core generate'; outputs are regenerated deterministically."
            }

            Error::Io(_) => "Check disk space, permissions, and that the paths exist.",
            Error::Json(_) => "Invalid JSON. Check the file syntax or regenerate it.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfigValue { .. } => "Invalid Configuration Value",

            Error::InvalidInput { .. } => "Invalid Edge Record",
            Error::InvalidLabel(_) => "Invalid Class Label",
            Error::NoInputs(_) => "No Input Files",

            Error::UnsortedInput { .. } => "Unsorted Input",
            Error::TimestampOutOfRange { .. } => "Timestamp Out Of Range",

            Error::FeatureArityMismatch { .. } => "Feature Arity Mismatch",
            Error::Extraction { .. } => "Feature Extraction Failed",
            Error::ExtractorTimeout { .. } => "Feature Extractor Timeout",

            Error::StorageWrite { .. } => "Storage Write Failed",
            Error::SampleSetNotFound { .. } => "Sample Set Not Found",
            Error::ManifestCorrupted(_) => "Sample Manifest Corrupted",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g. class, config, sample index).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidInput { path, line, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
                context.insert("line".to_string(), serde_json::json!(line));
            }
            Error::UnsortedInput {
                position,
                timestamp,
                previous,
            } => {
                context.insert("position".to_string(), serde_json::json!(position));
                context.insert("timestamp".to_string(), serde_json::json!(timestamp));
                context.insert("previous".to_string(), serde_json::json!(previous));
            }
            Error::TimestampOutOfRange {
                timestamp,
                bucket_secs,
            } => {
                context.insert("timestamp".to_string(), serde_json::json!(timestamp));
                context.insert("bucket_secs".to_string(), serde_json::json!(bucket_secs));
            }
            Error::FeatureArityMismatch {
                sample,
                expected,
                actual,
                ..
            } => {
                context.insert("sample".to_string(), serde_json::json!(sample));
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("actual".to_string(), serde_json::json!(actual));
            }
            Error::Extraction { sample, .. } | Error::ExtractorTimeout { sample, .. } => {
                context.insert("sample".to_string(), serde_json::json!(sample));
            }
            Error::StorageWrite {
                class,
                config,
                index,
                ..
            } => {
                context.insert("class".to_string(), serde_json::json!(class));
                context.insert("config".to_string(), serde_json::json!(config));
                if let Some(index) = index {
                    context.insert("index".to_string(), serde_json::json!(index));
                }
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Result of a fan-out over independent units that may partially succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// Successfully completed items.
    pub succeeded: Vec<T>,

    /// Failed items with their errors.
    pub failed: Vec<BatchError>,

    /// Summary statistics.
    pub summary: BatchSummary,
}

/// A single error in a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Identifier of the failed unit (e.g. `email/b86400-r1`).
    pub item_id: String,

    /// The structured error.
    pub error: StructuredError,
}

/// Summary of batch operation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
    pub any_succeeded: bool,
}

impl<T> BatchResult<T> {
    /// Create a new batch result from succeeded and failed items.
    pub fn new(succeeded: Vec<T>, failed: Vec<BatchError>) -> Self {
        let total = succeeded.len() + failed.len();
        let succeeded_count = succeeded.len();
        let failed_count = failed.len();

        BatchResult {
            succeeded,
            failed,
            summary: BatchSummary {
                total,
                succeeded: succeeded_count,
                failed: failed_count,
                all_succeeded: failed_count == 0,
                any_succeeded: succeeded_count > 0,
            },
        }
    }

    /// Add a failure to the batch result.
    pub fn add_failure(&mut self, item_id: impl Into<String>, error: StructuredError) {
        self.failed.push(BatchError {
            item_id: item_id.into(),
            error,
        });
        self.summary.failed += 1;
        self.summary.total += 1;
        self.summary.all_succeeded = false;
    }

    /// Add a success to the batch result.
    pub fn add_success(&mut self, item: T) {
        self.succeeded.push(item);
        self.summary.succeeded += 1;
        self.summary.total += 1;
        self.summary.any_succeeded = true;
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

/// Format a batch result for human-readable stderr output.
pub fn format_batch_human<T>(result: &BatchResult<T>, use_color: bool) -> String {
    let (green, red, reset) = if use_color {
        ("\x1b[32m", "\x1b[31m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    let mut output = String::new();

    if result.summary.all_succeeded {
        output.push_str(&format!(
            "{green}✓{reset} All {} units completed successfully\n",
            result.summary.total,
            green = green,
            reset = reset
        ));
    } else if result.summary.any_succeeded {
        output.push_str(&format!(
            "Partial success: {} of {} units completed\n",
            result.summary.succeeded, result.summary.total
        ));
    } else {
        output.push_str(&format!(
            "{red}✗{reset} All {} units failed\n",
            result.summary.total,
            red = red,
            reset = reset
        ));
    }

    if !result.failed.is_empty() {
        output.push_str("\nErrors:\n");
        for batch_err in &result.failed {
            output.push_str(&format!(
                "  {red}✗{reset} {}: {}\n",
                batch_err.item_id,
                batch_err.error.message,
                red = red,
                reset = reset
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_error() -> Error {
        Error::StorageWrite {
            class: "email".into(),
            config: "b86400-r1".into(),
            index: Some(7),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(
            Error::UnsortedInput {
                position: 1,
                timestamp: 0,
                previous: 1
            }
            .code(),
            30
        );
        assert_eq!(storage_error().code(), 50);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::Config("test".into()).category(), ErrorCategory::Config);
        assert_eq!(
            Error::NoInputs("/data".into()).category(),
            ErrorCategory::Input
        );
        assert_eq!(storage_error().category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(!Error::UnsortedInput {
            position: 3,
            timestamp: 5,
            previous: 9
        }
        .is_recoverable());
        assert!(storage_error().is_recoverable());
        assert!(!Error::FeatureArityMismatch {
            sample: "s".into(),
            kind: "static".into(),
            expected: 13,
            actual: 12
        }
        .is_recoverable());
    }

    #[test]
    fn test_storage_write_message_names_index() {
        let msg = storage_error().to_string();
        assert!(msg.contains("email/b86400-r1 sample 7"), "{msg}");

        let no_index = Error::StorageWrite {
            class: "email".into(),
            config: "b86400-r1".into(),
            index: None,
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(
            no_index.to_string(),
            "failed to write email/b86400-r1: disk full"
        );
    }

    #[test]
    fn test_structured_error_context() {
        let structured = StructuredError::from(&storage_error());
        assert_eq!(structured.code, 50);
        assert_eq!(structured.suggested_action, SuggestedAction::CheckStorage);
        assert_eq!(structured.context.get("index"), Some(&serde_json::json!(7)));
        assert_eq!(
            structured.context.get("class"),
            Some(&serde_json::json!("email"))
        );
    }

    #[test]
    fn test_structured_error_json() {
        let err = Error::ExtractorTimeout {
            sample: "email/b86400-r0/000001".into(),
            seconds: 30,
        };
        let json = StructuredError::from(&err)
            .with_context("stage", "extract")
            .to_json();

        assert!(json.contains(r#""code":42"#));
        assert!(json.contains(r#""category":"features""#));
        assert!(json.contains(r#""recoverable":true"#));
        assert!(json.contains(r#""stage":"extract""#));
    }

    #[test]
    fn test_batch_result() {
        let mut batch: BatchResult<String> = BatchResult::default();

        batch.add_success("email/b86400-r0".to_string());
        batch.add_success("email/b86400-r1".to_string());
        batch.add_failure("chat/b86400-r0", StructuredError::from(&storage_error()));

        assert_eq!(batch.summary.total, 3);
        assert_eq!(batch.summary.succeeded, 2);
        assert_eq!(batch.summary.failed, 1);
        assert!(!batch.summary.all_succeeded);
        assert!(batch.summary.any_succeeded);

        let human = format_batch_human(&batch, false);
        assert!(human.contains("Partial success: 2 of 3"));
        assert!(human.contains("chat/b86400-r0"));
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::UnsortedInput {
            position: 17,
            timestamp: 100,
            previous: 200,
        };
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Unsorted Input"));
        assert!(formatted.contains("edge 17 at t=100"));
        assert!(formatted.contains("Sort the edge file"));
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(ErrorCategory::Windowing.to_string(), "windowing");
        assert_eq!(SuggestedAction::FixInput.to_string(), "fix_input");
    }
}
