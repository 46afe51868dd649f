//! Fuzz target for bucketing and windowing.
//!
//! Sorted timestamps must bucket without panicking, buckets must cover
//! every edge exactly once, and the window count must match the formula.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tw_common::EdgeRecord;
use tw_core::bucket::bucketize;
use tw_core::window::{generate_windows, window_count};

#[derive(Debug, Arbitrary)]
struct Input {
    timestamps: Vec<i32>,
    bucket_secs: u16,
    radius: u8,
    sort: bool,
}

fuzz_target!(|input: Input| {
    let mut timestamps = input.timestamps;
    if input.sort {
        timestamps.sort_unstable();
    }
    let edges: Vec<EdgeRecord> = timestamps
        .iter()
        .map(|&t| EdgeRecord::new("u", "v", i64::from(t)))
        .collect();
    let bucket_secs = i64::from(input.bucket_secs.max(1)) * 60;

    let Ok(buckets) = bucketize(&edges, bucket_secs) else {
        return;
    };
    let covered: usize = buckets.iter().map(|b| b.len()).sum();
    assert_eq!(covered, edges.len());

    let radius = u32::from(input.radius % 8);
    let windows = generate_windows(&buckets, radius);
    assert_eq!(windows.len(), window_count(buckets.len(), radius));
});
