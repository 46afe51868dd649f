//! Context windows over a bucket sequence.
//!
//! A window of radius `r` centered at bucket `c` spans buckets
//! `c - r ..= c + r`. Centers run over `[r, len - r - 1]`, so a sequence of
//! `len` buckets yields `max(0, len - 2r)` windows. Empty windows are
//! yielded like any other; dropping them is the writer's job.

use std::iter::FusedIterator;

use tw_common::EdgeRecord;

use crate::bucket::TimeBucket;

/// A contiguous run of `2r + 1` buckets around a center bucket.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow<'b, 'a> {
    /// Index of the center bucket.
    pub index: usize,
    pub buckets: &'b [TimeBucket<'a>],
}

impl<'b, 'a> ContextWindow<'b, 'a> {
    /// Edges of all buckets, in bucket order.
    pub fn edges(&self) -> impl Iterator<Item = &'a EdgeRecord> + 'b {
        self.buckets.iter().flat_map(|b| b.edges.iter())
    }

    pub fn edge_count(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_empty())
    }

    /// Start of the first bucket in the window.
    pub fn start(&self) -> Option<i64> {
        self.buckets.first().map(|b| b.start)
    }
}

/// Number of windows of `radius` over `len` buckets.
pub fn window_count(len: usize, radius: u32) -> usize {
    let span = 2 * radius as usize;
    len.saturating_sub(span)
}

/// Lazy iterator over context windows in increasing center order.
#[derive(Debug, Clone)]
pub struct Windows<'b, 'a> {
    buckets: &'b [TimeBucket<'a>],
    radius: usize,
    /// Next center.
    center: usize,
    /// One past the last center.
    end: usize,
}

impl<'b, 'a> Iterator for Windows<'b, 'a> {
    type Item = ContextWindow<'b, 'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.center >= self.end {
            return None;
        }
        let c = self.center;
        self.center += 1;
        Some(ContextWindow {
            index: c,
            buckets: &self.buckets[c - self.radius..=c + self.radius],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.center);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Windows<'_, '_> {}

impl FusedIterator for Windows<'_, '_> {}

/// Slide a window of `radius` over `buckets`.
pub fn generate_windows<'b, 'a>(buckets: &'b [TimeBucket<'a>], radius: u32) -> Windows<'b, 'a> {
    let radius = radius as usize;
    let count = window_count(buckets.len(), radius as u32);
    Windows {
        buckets,
        radius,
        center: radius,
        end: radius + count,
    }
}
