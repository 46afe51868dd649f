//! Test utilities for tw-core.
//!
//! This module provides test infrastructure including:
//! - Edge and class-file builders
//! - Config file helpers
//! - Common assertions
//! - Tempdir management

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tw_common::{EdgeRecord, SECS_PER_DAY};

// ============================================================================
// Macros (must be defined first for use in this module)
// ============================================================================

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(_) => {}
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => panic!("{}: got Ok({:?})", $msg, val),
            Err(_) => {}
        }
    };
}

// ============================================================================
// Edge builders
// ============================================================================

/// 2021-01-01T00:00:00Z, a day boundary.
pub const T0: i64 = 1_609_459_200;

/// Shorthand edge constructor.
pub fn edge(source: &str, target: &str, timestamp: i64) -> EdgeRecord {
    EdgeRecord::new(source, target, timestamp)
}

/// Edges spread over consecutive days starting at [`T0`].
///
/// `per_day[i]` edges land in day `i`, one minute apart, cycling over a
/// small node set so every day has some structure.
pub fn daily_edges(per_day: &[usize]) -> Vec<EdgeRecord> {
    const NODES: [&str; 4] = ["a", "b", "c", "d"];
    let mut edges = Vec::new();
    for (day, &count) in per_day.iter().enumerate() {
        for k in 0..count {
            let source = NODES[k % NODES.len()];
            let target = NODES[(k + 1) % NODES.len()];
            let ts = T0 + day as i64 * SECS_PER_DAY + k as i64 * 60;
            edges.push(edge(source, target, ts));
        }
    }
    edges
}

/// Render edges in the input line format.
pub fn render_edges(edges: &[EdgeRecord]) -> String {
    edges
        .iter()
        .map(|e| format!("{} {} {}\n", e.source, e.target, e.timestamp))
        .collect()
}

/// Write one class input file `<dir>/<label>.txt`.
pub fn write_class_file(dir: &Path, label: &str, edges: &[EdgeRecord]) -> PathBuf {
    let path = dir.join(format!("{}.txt", label));
    let mut file = fs::File::create(&path).expect("Failed to create class file");
    file.write_all(render_edges(edges).as_bytes())
        .expect("Failed to write class file");
    path
}

/// Write a TOML pipeline config into `dir` and return its path.
pub fn write_config(dir: &Path, toml: &str) -> PathBuf {
    let path = dir.join("pipeline.toml");
    fs::write(&path, toml).expect("Failed to write config");
    path
}

// ============================================================================
// Test Timer
// ============================================================================

/// Test timer for measuring duration of operations.
pub struct TestTimer {
    name: String,
    start: Instant,
}

impl TestTimer {
    /// Start a new timer with the given name.
    pub fn new(name: &str) -> Self {
        let timer = Self {
            name: name.to_string(),
            start: Instant::now(),
        };
        eprintln!("[TIMER] {} started", name);
        timer
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for TestTimer {
    fn drop(&mut self) {
        eprintln!("[TIMER] {} completed in {}ms", self.name, self.elapsed_ms());
    }
}

// ============================================================================
// Tempdir Helper
// ============================================================================

/// Create a temporary directory that is automatically cleaned up.
///
/// Uses the `tempfile` crate's TempDir.
#[cfg(feature = "test-tempdir")]
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_edges_layout() {
        let edges = daily_edges(&[2, 0, 1]);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2].timestamp, T0 + 2 * SECS_PER_DAY);
        assert!(edges.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_render_round_trips_through_ingest() {
        let edges = daily_edges(&[3, 1]);
        let parsed =
            crate::ingest::read_edges_from(std::io::Cursor::new(render_edges(&edges)), "mem");
        assert_eq!(assert_ok!(parsed), edges);
    }

    #[test]
    fn test_assert_macros() {
        let ok: Result<u32, String> = Ok(3);
        assert_eq!(assert_ok!(ok), 3);
        let err: Result<u32, String> = Err("boom".into());
        assert_err!(err);
    }
}
