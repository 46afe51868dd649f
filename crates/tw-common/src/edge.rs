//! Canonical timestamped edge record.

use crate::id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in one UTC calendar day.
pub const SECS_PER_DAY: i64 = 86_400;

/// A directed, timestamped relation between two nodes.
///
/// Records are immutable once read; no deduplication is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub target: NodeId,
    /// Seconds since the Unix epoch (UTC).
    pub timestamp: i64,
}

impl EdgeRecord {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, timestamp: i64) -> Self {
        EdgeRecord {
            source: source.into(),
            target: target.into(),
            timestamp,
        }
    }

    /// Start of the bucket containing this edge, for buckets of
    /// `bucket_secs` aligned to the UTC epoch.
    ///
    /// With `bucket_secs == SECS_PER_DAY` this is the UTC calendar day.
    /// `None` when the boundary falls below `i64::MIN`.
    pub fn bucket_start(&self, bucket_secs: i64) -> Option<i64> {
        self.timestamp
            .div_euclid(bucket_secs)
            .checked_mul(bucket_secs)
    }

    /// Timestamp as a UTC datetime, if representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for EdgeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.target, self.timestamp)
    }
}
