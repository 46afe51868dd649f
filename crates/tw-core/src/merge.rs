//! Feature merge: joins a unit's manifest with its feature rows.
//!
//! Each merged row is the static counts followed by the temporal counts,
//! tagged with the class label and the sample's chronological index.

use std::path::Path;

use serde::Serialize;
use tw_common::{ConfigKey, Error, Label, Result, SampleId};

use crate::features::{self, FeatureRow, MotifKind};
use crate::sample::store::{self, Manifest};

/// One sample ready for a split table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledSample {
    pub class: Label,
    pub index: u64,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    /// Static counts then temporal counts.
    pub features: Vec<u64>,
}

/// Width of a merged feature vector.
pub fn feature_width() -> usize {
    MotifKind::Static.arity() + MotifKind::Temporal.arity()
}

fn check_arity(id: &SampleId, kind: MotifKind, counts: &[u64]) -> Result<()> {
    if counts.len() != kind.arity() {
        return Err(Error::FeatureArityMismatch {
            sample: id.to_string(),
            kind: kind.as_str().to_string(),
            expected: kind.arity(),
            actual: counts.len(),
        });
    }
    Ok(())
}

/// Merge feature rows with their manifest entries, in manifest order.
///
/// Every manifest entry needs exactly one feature row with the same index.
pub fn merge_unit(
    manifest: &Manifest,
    config: ConfigKey,
    rows: &[FeatureRow],
) -> Result<Vec<LabeledSample>> {
    if rows.len() != manifest.samples.len() {
        return Err(Error::ManifestCorrupted(format!(
            "{}/{}: {} samples but {} feature rows",
            manifest.class,
            manifest.config,
            manifest.samples.len(),
            rows.len()
        )));
    }

    manifest
        .samples
        .iter()
        .zip(rows)
        .map(|(entry, row)| {
            let id = SampleId::new(manifest.class.clone(), config, entry.index);
            if row.index != entry.index {
                return Err(Error::ManifestCorrupted(format!(
                    "feature row {} does not match sample {}",
                    row.index, id
                )));
            }
            check_arity(&id, MotifKind::Static, &row.static_counts)?;
            check_arity(&id, MotifKind::Temporal, &row.temporal_counts)?;

            let mut features = Vec::with_capacity(feature_width());
            features.extend_from_slice(&row.static_counts);
            features.extend_from_slice(&row.temporal_counts);
            Ok(LabeledSample {
                class: manifest.class.clone(),
                index: entry.index,
                first_timestamp: entry.first_timestamp,
                last_timestamp: entry.last_timestamp,
                features,
            })
        })
        .collect()
}

/// Load and merge one persisted unit.
pub fn load_unit(samples_root: &Path, class: &Label, config: ConfigKey) -> Result<Vec<LabeledSample>> {
    let dir = store::unit_dir(samples_root, class, config);
    let manifest = store::read_manifest(&dir)?;
    let rows = features::read_features(&dir)?;
    merge_unit(&manifest, config, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::store::ManifestEntry;

    fn manifest(n: u64) -> Manifest {
        let mut m = Manifest::new(&Label("web".into()), ConfigKey::new(86_400, 1));
        for i in 0..n {
            m.samples.push(ManifestEntry {
                index: i,
                center: i as usize + 1,
                file: format!("{:06}.edges", i),
                edge_count: 1,
                first_timestamp: i as i64 * 10,
                last_timestamp: i as i64 * 10 + 5,
                sha256: String::new(),
            });
        }
        m
    }

    fn row(index: u64, s: usize, t: usize) -> FeatureRow {
        FeatureRow {
            index,
            static_counts: vec![1; s],
            temporal_counts: vec![2; t],
        }
    }

    #[test]
    fn test_merge_static_prefix() {
        let m = manifest(2);
        let merged = merge_unit(&m, ConfigKey::new(86_400, 1), &[row(0, 13, 36), row(1, 13, 36)])
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].index, 1);
        assert_eq!(merged[1].first_timestamp, 10);
        assert_eq!(merged[0].features.len(), 49);
        assert!(merged[0].features[..13].iter().all(|&v| v == 1));
        assert!(merged[0].features[13..].iter().all(|&v| v == 2));
    }

    #[test]
    fn test_merge_arity_mismatch_names_sample() {
        let m = manifest(2);
        let err = merge_unit(&m, ConfigKey::new(86_400, 1), &[row(0, 13, 36), row(1, 13, 30)])
            .unwrap_err();
        match err {
            Error::FeatureArityMismatch { sample, kind, .. } => {
                assert_eq!(sample, "web/b86400-r1/000001");
                assert_eq!(kind, "temporal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_rejects_missing_rows() {
        let m = manifest(2);
        assert!(matches!(
            merge_unit(&m, ConfigKey::new(86_400, 1), &[row(0, 13, 36)]),
            Err(Error::ManifestCorrupted(_))
        ));
        assert!(matches!(
            merge_unit(&m, ConfigKey::new(86_400, 1), &[row(1, 13, 36), row(0, 13, 36)]),
            Err(Error::ManifestCorrupted(_))
        ));
    }
}
