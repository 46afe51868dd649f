//! Fuzz target for edge line parsing.
//!
//! Tests that `parse_line` handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tw_core::ingest::parse_line;

fuzz_target!(|data: &str| {
    for (idx, line) in data.lines().enumerate() {
        let _ = parse_line(line, "fuzz", idx + 1);
    }
});
