//! Feature extraction: per-sample motif count vectors.
//!
//! Extraction is a pluggable capability. Each [`FeatureExtractor`] maps a
//! sample's edge list to a fixed-length count vector whose arity depends only
//! on its [`MotifKind`]. Native counters live in [`static_motifs`] and
//! [`temporal_motifs`]; [`command`] wraps external counting tools.
//!
//! Results for one unit are persisted as `features.csv` next to the unit's
//! manifest, one row per sample in manifest order.

pub mod command;
pub mod static_motifs;
pub mod temporal_motifs;

pub use command::{CommandExtractor, ExtractorError};
pub use static_motifs::StaticMotifCounter;
pub use temporal_motifs::TemporalMotifCounter;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tw_common::{EdgeRecord, Error, Result, SampleId};
use tw_config::pipeline::{ExtractorBackend, FeatureConfig};

use crate::logging::event_names;
use crate::sample::store;

/// Per-unit feature file name.
pub const FEATURES_FILE: &str = "features.csv";

/// Family of motif counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifKind {
    Static,
    Temporal,
}

impl MotifKind {
    /// Fixed vector length for this kind.
    pub fn arity(&self) -> usize {
        match self {
            MotifKind::Static => 13,
            MotifKind::Temporal => 36,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotifKind::Static => "static",
            MotifKind::Temporal => "temporal",
        }
    }

    /// Column name prefix in feature tables.
    pub fn column_prefix(&self) -> char {
        match self {
            MotifKind::Static => 's',
            MotifKind::Temporal => 't',
        }
    }

    /// Column names, `s0..s12` or `t0..t35`.
    pub fn columns(&self) -> impl Iterator<Item = String> {
        let prefix = self.column_prefix();
        (0..self.arity()).map(move |i| format!("{prefix}{i}"))
    }
}

impl std::fmt::Display for MotifKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed parameters shared by every sample of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractParams {
    /// Temporal motif time threshold δ in seconds.
    pub delta_secs: i64,
}

/// One sample as seen by an extractor.
#[derive(Debug, Clone, Copy)]
pub struct SampleInput<'a> {
    pub id: &'a SampleId,
    /// Persisted sample file; external tools read this.
    pub path: &'a Path,
    pub edges: &'a [EdgeRecord],
}

/// An arity-checked count vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector {
    pub kind: MotifKind,
    pub counts: Vec<u64>,
}

/// Maps a sample's edges to a count vector.
pub trait FeatureExtractor: Send + Sync {
    fn kind(&self) -> MotifKind;

    fn extract(&self, sample: &SampleInput<'_>, params: &ExtractParams) -> Result<Vec<u64>>;
}

/// Run an extractor and enforce the arity of its kind.
pub fn checked_extract(
    extractor: &dyn FeatureExtractor,
    sample: &SampleInput<'_>,
    params: &ExtractParams,
) -> Result<FeatureVector> {
    let kind = extractor.kind();
    let counts = extractor.extract(sample, params)?;
    if counts.len() != kind.arity() {
        return Err(Error::FeatureArityMismatch {
            sample: sample.id.to_string(),
            kind: kind.as_str().to_string(),
            expected: kind.arity(),
            actual: counts.len(),
        });
    }
    Ok(FeatureVector { kind, counts })
}

/// The static and temporal extractors used for a run.
pub struct FeatureSet {
    pub static_extractor: Box<dyn FeatureExtractor>,
    pub temporal_extractor: Box<dyn FeatureExtractor>,
    pub params: ExtractParams,
}

impl std::fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureSet")
            .field("static", &self.static_extractor.kind())
            .field("temporal", &self.temporal_extractor.kind())
            .field("params", &self.params)
            .finish()
    }
}

impl FeatureSet {
    /// In-process motif counters.
    pub fn native(delta_secs: i64) -> Self {
        FeatureSet {
            static_extractor: Box::new(StaticMotifCounter::new()),
            temporal_extractor: Box::new(TemporalMotifCounter::new()),
            params: ExtractParams { delta_secs },
        }
    }

    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        match config.backend {
            ExtractorBackend::Native => Ok(Self::native(config.delta_secs)),
            ExtractorBackend::Command => {
                let timeout = Duration::from_secs(config.timeout_secs);
                let missing = |field: &str| Error::InvalidConfigValue {
                    field: field.to_string(),
                    message: "required for the command backend".to_string(),
                };
                let static_spec = config
                    .static_command
                    .clone()
                    .ok_or_else(|| missing("features.static_command"))?;
                let temporal_spec = config
                    .temporal_command
                    .clone()
                    .ok_or_else(|| missing("features.temporal_command"))?;
                Ok(FeatureSet {
                    static_extractor: Box::new(CommandExtractor::new(
                        MotifKind::Static,
                        static_spec,
                        timeout,
                    )),
                    temporal_extractor: Box::new(CommandExtractor::new(
                        MotifKind::Temporal,
                        temporal_spec,
                        timeout,
                    )),
                    params: ExtractParams {
                        delta_secs: config.delta_secs,
                    },
                })
            }
        }
    }
}

/// Feature counts of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    pub index: u64,
    pub static_counts: Vec<u64>,
    pub temporal_counts: Vec<u64>,
}

/// Header of `features.csv`.
pub fn features_header() -> Vec<String> {
    std::iter::once("index".to_string())
        .chain(MotifKind::Static.columns())
        .chain(MotifKind::Temporal.columns())
        .collect()
}

/// Extract features for every sample of one unit and write `features.csv`.
///
/// Samples are processed in manifest order; the first failure aborts the
/// unit and leaves any earlier `features.csv` untouched.
pub fn extract_features(unit_dir: &Path, features: &FeatureSet) -> Result<Vec<FeatureRow>> {
    let manifest = store::read_manifest(unit_dir)?;
    let config = tw_common::ConfigKey::parse(&manifest.config).ok_or_else(|| {
        Error::ManifestCorrupted(format!("bad configuration key {:?}", manifest.config))
    })?;

    let mut rows = Vec::with_capacity(manifest.samples.len());
    for entry in &manifest.samples {
        let id = SampleId::new(manifest.class.clone(), config, entry.index);
        let edges = store::read_sample(unit_dir, entry)?;
        let path = unit_dir.join(&entry.file);
        let input = SampleInput {
            id: &id,
            path: &path,
            edges: &edges,
        };

        let extract = |ex: &dyn FeatureExtractor| {
            checked_extract(ex, &input, &features.params).inspect_err(|e| {
                if let Error::ExtractorTimeout { seconds, .. } = e {
                    warn!(
                        target: event_names::EXTRACT_TIMEOUT,
                        sample = %id,
                        kind = %ex.kind(),
                        seconds,
                        "extractor timed out"
                    );
                }
            })
        };
        let static_counts = extract(features.static_extractor.as_ref())?.counts;
        let temporal_counts = extract(features.temporal_extractor.as_ref())?.counts;

        debug!(
            target: event_names::EXTRACT_SAMPLE_DONE,
            sample = %id,
            edges = edges.len(),
            "sample features extracted"
        );
        rows.push(FeatureRow {
            index: entry.index,
            static_counts,
            temporal_counts,
        });
    }

    write_features(unit_dir, &manifest.class, &manifest.config, &rows)?;
    Ok(rows)
}

fn write_features(
    unit_dir: &Path,
    class: &tw_common::Label,
    config: &str,
    rows: &[FeatureRow],
) -> Result<()> {
    let storage_err = |source: std::io::Error| Error::StorageWrite {
        class: class.to_string(),
        config: config.to_string(),
        index: None,
        source,
    };

    let mut wtr = csv::Writer::from_writer(vec![]);
    let encode = |wtr: &mut csv::Writer<Vec<u8>>| -> csv::Result<()> {
        wtr.write_record(features_header())?;
        for row in rows {
            let record = std::iter::once(row.index)
                .chain(row.static_counts.iter().copied())
                .chain(row.temporal_counts.iter().copied())
                .map(|v| v.to_string());
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    };
    encode(&mut wtr).map_err(|e| storage_err(e.into()))?;
    let bytes = wtr.into_inner().map_err(|e| storage_err(e.into_error()))?;

    store::atomic_write(&unit_dir.join(FEATURES_FILE), &bytes).map_err(storage_err)
}

/// Load `features.csv` of one unit, validating header and arity.
pub fn read_features(unit_dir: &Path) -> Result<Vec<FeatureRow>> {
    let path = unit_dir.join(FEATURES_FILE);
    if !path.is_file() {
        return Err(Error::SampleSetNotFound {
            path: path.display().to_string(),
        });
    }
    let corrupted =
        |message: String| Error::ManifestCorrupted(format!("{}: {}", path.display(), message));

    let mut rdr = csv::Reader::from_path(&path).map_err(|e| corrupted(e.to_string()))?;
    let header = rdr.headers().map_err(|e| corrupted(e.to_string()))?;
    if header.iter().ne(features_header().iter().map(String::as_str)) {
        return Err(corrupted("unexpected header".to_string()));
    }

    let static_len = MotifKind::Static.arity();
    let width = 1 + static_len + MotifKind::Temporal.arity();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| corrupted(e.to_string()))?;
        let values = record
            .iter()
            .map(|v| v.parse::<u64>())
            .collect::<std::result::Result<Vec<u64>, _>>()
            .map_err(|e| corrupted(e.to_string()))?;
        if values.len() != width {
            return Err(corrupted(format!(
                "expected {} columns, got {}",
                width,
                values.len()
            )));
        }
        let (&index, counts) = (&values[0], &values[1..]);
        let (static_counts, temporal_counts) = counts.split_at(static_len);
        rows.push(FeatureRow {
            index,
            static_counts: static_counts.to_vec(),
            temporal_counts: temporal_counts.to_vec(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{write_samples, DirectorySink};
    use crate::{bucket::bucketize, window::generate_windows};
    use tempfile::TempDir;
    use tw_common::{ConfigKey, Label};

    struct FixedExtractor {
        kind: MotifKind,
        len: usize,
    }

    impl FeatureExtractor for FixedExtractor {
        fn kind(&self) -> MotifKind {
            self.kind
        }

        fn extract(&self, sample: &SampleInput<'_>, _: &ExtractParams) -> Result<Vec<u64>> {
            Ok(vec![sample.edges.len() as u64; self.len])
        }
    }

    fn write_unit(root: &Path) -> std::path::PathBuf {
        let edges = [
            EdgeRecord::new("a", "b", 0),
            EdgeRecord::new("b", "c", 10),
            EdgeRecord::new("c", "a", 86_400),
        ];
        let buckets = bucketize(&edges, 86_400).unwrap();
        let class = Label("email".into());
        let config = ConfigKey::new(86_400, 0);
        let mut sink = DirectorySink::new(root, ' ');
        write_samples(generate_windows(&buckets, 0), &class, config, &mut sink).unwrap();
        store::unit_dir(root, &class, config)
    }

    #[test]
    fn test_header_layout() {
        let header = features_header();
        assert_eq!(header.len(), 1 + 13 + 36);
        assert_eq!(header[0], "index");
        assert_eq!(header[1], "s0");
        assert_eq!(header[13], "s12");
        assert_eq!(header[14], "t0");
        assert_eq!(header[49], "t35");
    }

    #[test]
    fn test_checked_extract_rejects_wrong_arity() {
        let id = SampleId::new(Label("x".into()), ConfigKey::new(60, 0), 7);
        let input = SampleInput {
            id: &id,
            path: Path::new("unused"),
            edges: &[],
        };
        let bad = FixedExtractor {
            kind: MotifKind::Temporal,
            len: 35,
        };
        let err = checked_extract(&bad, &input, &ExtractParams { delta_secs: 1 }).unwrap_err();
        match err {
            Error::FeatureArityMismatch {
                sample,
                expected,
                actual,
                ..
            } => {
                assert_eq!(sample, "x/b60-r0/000007");
                assert_eq!((expected, actual), (36, 35));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_and_read_back() {
        let dir = TempDir::new().unwrap();
        let unit = write_unit(dir.path());

        let rows = extract_features(&unit, &FeatureSet::native(3_600)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        // Two edges: one static triad, no three-edge temporal motif.
        assert!(rows[0].temporal_counts.iter().all(|&c| c == 0));
        assert_eq!(rows[0].static_counts.iter().sum::<u64>(), 1);

        let loaded = read_features(&unit).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_arity_failure_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let unit = write_unit(dir.path());
        extract_features(&unit, &FeatureSet::native(3_600)).unwrap();
        let before = std::fs::read(unit.join(FEATURES_FILE)).unwrap();

        let broken = FeatureSet {
            static_extractor: Box::new(FixedExtractor {
                kind: MotifKind::Static,
                len: 12,
            }),
            temporal_extractor: Box::new(TemporalMotifCounter::new()),
            params: ExtractParams { delta_secs: 1 },
        };
        assert!(matches!(
            extract_features(&unit, &broken),
            Err(Error::FeatureArityMismatch { .. })
        ));
        assert_eq!(std::fs::read(unit.join(FEATURES_FILE)).unwrap(), before);
    }

    #[test]
    fn test_missing_features_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_features(dir.path()),
            Err(Error::SampleSetNotFound { .. })
        ));
    }
}
