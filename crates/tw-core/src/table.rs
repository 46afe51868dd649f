//! Train/test table output.
//!
//! ```text
//! <tables>/<config>/train.csv
//! <tables>/<config>/test.csv
//! <tables>/<config>/summary.json
//! ```
//!
//! Each CSV row is the merged feature vector followed by the class label.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tw_common::{ConfigKey, Error, Label, Result};

use crate::features::MotifKind;
use crate::merge::LabeledSample;
use crate::sample::store;
use crate::split::{ClassSplit, SplitTables};

pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Schema version of `summary.json`.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0.0";

/// Row counts for one configuration's tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub schema_version: String,
    pub config: String,
    pub train_fraction: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub classes: Vec<ClassCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub class: Label,
    pub total: usize,
    pub train: usize,
    pub test: usize,
}

impl From<&ClassSplit> for ClassCounts {
    fn from(split: &ClassSplit) -> Self {
        ClassCounts {
            class: split.class.clone(),
            total: split.total,
            train: split.train,
            test: split.test,
        }
    }
}

pub fn table_dir(tables_root: &Path, config: ConfigKey) -> PathBuf {
    tables_root.join(config.to_string())
}

/// Header row: feature columns then `label`.
pub fn table_header() -> Vec<String> {
    MotifKind::Static
        .columns()
        .chain(MotifKind::Temporal.columns())
        .chain(std::iter::once("label".to_string()))
        .collect()
}

/// Encode rows as CSV with a header.
pub fn encode_table(rows: &[LabeledSample]) -> csv::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(table_header())?;
    for row in rows {
        let record = row
            .features
            .iter()
            .map(|v| v.to_string())
            .chain(std::iter::once(row.class.to_string()));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Write train, test and summary for one configuration.
pub fn write_tables(
    tables_root: &Path,
    config: ConfigKey,
    train_fraction: f64,
    tables: &SplitTables<LabeledSample>,
) -> Result<TableSummary> {
    let dir = table_dir(tables_root, config);
    let storage_err = |source: std::io::Error| Error::StorageWrite {
        class: "*".to_string(),
        config: config.to_string(),
        index: None,
        source,
    };
    fs::create_dir_all(&dir).map_err(storage_err)?;

    for (file, rows) in [(TRAIN_FILE, &tables.train), (TEST_FILE, &tables.test)] {
        let bytes = encode_table(rows).map_err(|e| storage_err(e.into()))?;
        store::atomic_write(&dir.join(file), &bytes).map_err(storage_err)?;
    }

    let summary = TableSummary {
        schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
        config: config.to_string(),
        train_fraction,
        train_rows: tables.train.len(),
        test_rows: tables.test.len(),
        classes: tables.classes.iter().map(ClassCounts::from).collect(),
    };
    let mut json = serde_json::to_vec_pretty(&summary)?;
    json.push(b'\n');
    store::atomic_write(&dir.join(SUMMARY_FILE), &json).map_err(storage_err)?;

    Ok(summary)
}

/// Read a table back as (features, label) rows.
pub fn read_table(path: &Path) -> Result<Vec<(Vec<u64>, Label)>> {
    let invalid = |line: usize, message: String| Error::InvalidInput {
        path: path.display().to_string(),
        line,
        message,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(|e| invalid(1, e.to_string()))?;

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let line = i + 2;
        let record = record.map_err(|e| invalid(line, e.to_string()))?;
        let fields: Vec<&str> = record.iter().collect();
        let Some((label, features)) = fields.split_last() else {
            return Err(invalid(line, "empty record".to_string()));
        };
        let label =
            Label::parse(label).ok_or_else(|| invalid(line, format!("bad label {label:?}")))?;
        let features = features
            .iter()
            .map(|v| v.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid(line, e.to_string()))?;
        rows.push((features, label));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample(class: &str, index: u64) -> LabeledSample {
        LabeledSample {
            class: Label(class.to_string()),
            index,
            first_timestamp: index as i64,
            last_timestamp: index as i64,
            features: vec![index; 49],
        }
    }

    #[test]
    fn test_header() {
        let header = table_header();
        assert_eq!(header.len(), 50);
        assert_eq!(header.first().map(String::as_str), Some("s0"));
        assert_eq!(header.last().map(String::as_str), Some("label"));
    }

    #[test]
    fn test_write_and_read_tables() {
        let dir = TempDir::new().unwrap();
        let mut by_class = BTreeMap::new();
        by_class.insert(
            Label("email".into()),
            (0..5).map(|i| sample("email", i)).collect::<Vec<_>>(),
        );
        let tables = crate::split::split(&by_class, 0.8).unwrap();
        let config = ConfigKey::new(86_400, 0);

        let summary = write_tables(dir.path(), config, 0.8, &tables).unwrap();
        assert_eq!((summary.train_rows, summary.test_rows), (4, 1));

        let out = table_dir(dir.path(), config);
        let train = read_table(&out.join(TRAIN_FILE)).unwrap();
        assert_eq!(train.len(), 4);
        assert_eq!(train[3].0, vec![3; 49]);
        assert_eq!(train[3].1.as_str(), "email");

        let text = fs::read_to_string(out.join(TEST_FILE)).unwrap();
        assert!(text.starts_with("s0,s1,"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_empty_tables_have_header_only() {
        let rows: Vec<LabeledSample> = Vec::new();
        let bytes = encode_table(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.trim_end().ends_with(",label"));
    }
}
