//! Node, class and sample identity types.
//!
//! A sample is uniquely identified by (class, configuration, index) where the
//! index is the explicit chronological sort key assigned at write time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identifier as it appears in the source edge list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Class label attached to an entire source network.
///
/// Labels double as directory names in the sample layout, so only
/// `[A-Za-z0-9._-]` is accepted and the label may not start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub String);

impl Label {
    /// Parse and validate a label string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || s.starts_with('.') || s.len() > 128 {
            return None;
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return None;
        }
        Some(Label(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One windowing configuration: bucket duration plus look-around radius.
///
/// Format: `b<bucket_secs>-r<radius>`
/// Example: `b86400-r1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    /// Bucket duration in seconds.
    pub bucket_secs: i64,
    /// Number of buckets on each side of the window center.
    pub radius: u32,
}

impl ConfigKey {
    pub fn new(bucket_secs: i64, radius: u32) -> Self {
        ConfigKey {
            bucket_secs,
            radius,
        }
    }

    /// Number of buckets concatenated into one window.
    pub fn window_span(&self) -> u64 {
        2 * u64::from(self.radius) + 1
    }

    /// Parse a `b<secs>-r<radius>` directory name.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix('b')?;
        let (secs, radius) = rest.split_once("-r")?;
        let bucket_secs = secs.parse::<i64>().ok()?;
        if bucket_secs <= 0 {
            return None;
        }
        let radius = radius.parse::<u32>().ok()?;
        Some(ConfigKey {
            bucket_secs,
            radius,
        })
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}-r{}", self.bucket_secs, self.radius)
    }
}

/// Fully qualified sample identifier.
///
/// Format: `<class>/<config>/<index>`
/// Example: `email/b86400-r1/000042`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId {
    pub class: Label,
    pub config: ConfigKey,
    pub index: u64,
}

impl SampleId {
    pub fn new(class: Label, config: ConfigKey, index: u64) -> Self {
        SampleId {
            class,
            config,
            index,
        }
    }

    /// File name of the persisted sample, zero-padded so that lexical and
    /// numeric order agree for the first million samples.
    pub fn file_name(&self) -> String {
        format!("{:06}.edges", self.index)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:06}", self.class, self.config, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_valid() {
        assert!(Label::parse("email-eu").is_some());
        assert!(Label::parse("bitcoin_otc.v2").is_some());
    }

    #[test]
    fn test_label_parse_invalid() {
        assert!(Label::parse("").is_none());
        assert!(Label::parse(".hidden").is_none());
        assert!(Label::parse("a/b").is_none());
        assert!(Label::parse("with space").is_none());
    }

    #[test]
    fn test_config_key_roundtrip_display() {
        let key = ConfigKey::new(86_400, 1);
        assert_eq!(key.to_string(), "b86400-r1");
        assert_eq!(ConfigKey::parse("b86400-r1"), Some(key));
        assert_eq!(key.window_span(), 3);
    }

    #[test]
    fn test_config_key_parse_invalid() {
        assert!(ConfigKey::parse("86400-r1").is_none());
        assert!(ConfigKey::parse("b0-r1").is_none());
        assert!(ConfigKey::parse("b86400").is_none());
        assert!(ConfigKey::parse("b86400-r-1").is_none());
    }

    #[test]
    fn test_sample_id_display() {
        let id = SampleId::new(Label("email".into()), ConfigKey::new(86_400, 0), 42);
        assert_eq!(id.to_string(), "email/b86400-r0/000042");
        assert_eq!(id.file_name(), "000042.edges");
    }
}
