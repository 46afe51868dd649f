//! Event vocabulary shared by the pipeline and the JSONL layer.
//!
//! Every event emitted through `log_event!` carries the run and host IDs
//! from a [`LogContext`] plus one [`Stage`].

use serde::{Deserialize, Serialize};

/// Level as written in the `level` key of a JSONL line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Processing stages of the windowing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading edge files.
    Ingest,
    /// Grouping edges into time buckets.
    Bucket,
    /// Deriving context windows.
    Window,
    /// Persisting samples.
    Write,
    /// Motif feature extraction.
    Extract,
    /// Joining features with labels.
    Merge,
    /// Chronological train/test split.
    Split,
    /// Final summary output.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Ingest => "ingest",
            Stage::Bucket => "bucket",
            Stage::Window => "window",
            Stage::Write => "write",
            Stage::Extract => "extract",
            Stage::Merge => "merge",
            Stage::Split => "split",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Ingest stage
    pub const INGEST_CLASS_FOUND: &str = "ingest.class_found";
    pub const INGEST_FINISHED: &str = "ingest.finished";

    // Per (class, configuration) unit
    pub const UNIT_STARTED: &str = "unit.started";
    pub const UNIT_FINISHED: &str = "unit.finished";
    pub const UNIT_FAILED: &str = "unit.failed";

    // Window/write stages
    pub const WINDOW_NONE_PRODUCED: &str = "window.none_produced";
    pub const WRITE_SKIPPED_EMPTY: &str = "write.skipped_empty";

    // Extract stage
    pub const EXTRACT_SAMPLE_DONE: &str = "extract.sample_done";
    pub const EXTRACT_TIMEOUT: &str = "extract.timeout";

    // Split stage
    pub const SPLIT_TABLE_WRITTEN: &str = "split.table_written";
}

/// Correlation IDs stamped on every event of one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }
}
