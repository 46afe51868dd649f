//! Fixed-duration, gap-filled time bucketing.
//!
//! Buckets are aligned to the UTC epoch: an edge at `t` belongs to the bucket
//! starting at `floor(t / d) * d`. Consecutive buckets are exactly `d`
//! seconds apart. Gaps in the input produce explicit empty buckets.
//!
//! Buckets borrow their edges from the input slice, so the concatenation of
//! all bucket edge slices is the input slice itself.

use tw_common::{EdgeRecord, Error, Result};

/// A contiguous run of edges sharing one bucket boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket<'a> {
    /// Position in the bucket sequence, starting at 0.
    pub index: usize,
    /// Bucket start, seconds since the Unix epoch.
    pub start: i64,
    pub edges: &'a [EdgeRecord],
}

impl<'a> TimeBucket<'a> {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

/// Lazy bucket iterator over a sorted edge slice.
///
/// Yields `Err(UnsortedInput)` at the first timestamp decrease and then
/// stops.
#[derive(Debug, Clone)]
pub struct Buckets<'a> {
    edges: &'a [EdgeRecord],
    bucket_secs: i64,
    /// Offset of the next unconsumed edge.
    pos: usize,
    /// Start of the next bucket to emit.
    next_start: i64,
    next_index: usize,
    done: bool,
}

impl<'a> Buckets<'a> {
    /// Create a bucket iterator. `bucket_secs` must be positive and the
    /// first edge must have a representable bucket start.
    pub fn new(edges: &'a [EdgeRecord], bucket_secs: i64) -> Result<Self> {
        if bucket_secs <= 0 {
            return Err(Error::InvalidConfigValue {
                field: "bucket.duration_secs".to_string(),
                message: format!("must be positive, got {}", bucket_secs),
            });
        }
        let next_start = match edges.first() {
            Some(first) => {
                first
                    .bucket_start(bucket_secs)
                    .ok_or(Error::TimestampOutOfRange {
                        timestamp: first.timestamp,
                        bucket_secs,
                    })?
            }
            None => 0,
        };
        Ok(Buckets {
            edges,
            bucket_secs,
            pos: 0,
            next_start,
            next_index: 0,
            done: edges.is_empty(),
        })
    }

    pub fn bucket_secs(&self) -> i64 {
        self.bucket_secs
    }
}

impl<'a> Iterator for Buckets<'a> {
    type Item = Result<TimeBucket<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.next_start;
        let index = self.next_index;
        // None: the last representable bucket, unbounded above.
        let end_bound = start.checked_add(self.bucket_secs);
        let inside = |ts: i64| end_bound.map_or(true, |b| ts < b);
        let begin = self.pos;

        // Pending empty bucket before the next edge.
        if !inside(self.edges[begin].timestamp) {
            self.next_start = end_bound.unwrap_or(start);
            self.next_index += 1;
            return Some(Ok(TimeBucket {
                index,
                start,
                edges: &[],
            }));
        }

        let mut end = begin;
        while end < self.edges.len() && inside(self.edges[end].timestamp) {
            if end > 0 && self.edges[end].timestamp < self.edges[end - 1].timestamp {
                self.done = true;
                return Some(Err(Error::UnsortedInput {
                    position: end,
                    timestamp: self.edges[end].timestamp,
                    previous: self.edges[end - 1].timestamp,
                }));
            }
            end += 1;
        }

        self.pos = end;
        self.next_start = end_bound.unwrap_or(start);
        self.next_index += 1;
        if end == self.edges.len() {
            self.done = true;
        }

        Some(Ok(TimeBucket {
            index,
            start,
            edges: &self.edges[begin..end],
        }))
    }
}

impl std::iter::FusedIterator for Buckets<'_> {}

/// Group sorted edges into gap-filled buckets of `bucket_secs`.
pub fn bucketize(edges: &[EdgeRecord], bucket_secs: i64) -> Result<Vec<TimeBucket<'_>>> {
    Buckets::new(edges, bucket_secs)?.collect()
}
