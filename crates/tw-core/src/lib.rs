//! Temporal Windows Core Library
//!
//! Turns per-class temporal edge lists into labeled, feature-annotated
//! samples:
//! - Edge ingestion and class discovery
//! - Gap-filled time bucketing and sliding context windows
//! - Sample persistence with integrity manifests
//! - Static and temporal motif features (native or external)
//! - Per-class chronological train/test splits
//!
//! The binary entry point is in `main.rs`.

pub mod bucket;
pub mod config;
pub mod exit_codes;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod sample;
pub mod split;
pub mod table;
pub mod window;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
