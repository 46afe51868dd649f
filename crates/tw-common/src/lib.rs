//! Temporal Windows common types, IDs, and errors.
//!
//! This crate provides foundational types shared across tw-core modules:
//! - The canonical timestamped edge record
//! - Class label, configuration key and sample identity types
//! - Common error types with stable codes
//! - Output format specifications

pub mod edge;
pub mod error;
pub mod id;
pub mod output;

pub use edge::{EdgeRecord, SECS_PER_DAY};
pub use error::{Error, ErrorCategory, Result};
pub use id::{ConfigKey, Label, NodeId, SampleId};
pub use output::OutputFormat;

/// Schema version for persisted manifests and reports.
pub const SCHEMA_VERSION: &str = "1.0.0";
