//! Chronological train/test split.
//!
//! Each class's samples are already in chronological order. The first
//! `floor(train_fraction * n)` go to train, the rest to test. Nothing is
//! shuffled; class slices are concatenated in label order.

use std::collections::BTreeMap;

use serde::Serialize;
use tw_common::{Error, Label, Result};

/// Per-class split accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSplit {
    pub class: Label,
    pub total: usize,
    pub train: usize,
    pub test: usize,
}

/// Merged train and test tables.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTables<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
    pub classes: Vec<ClassSplit>,
}

/// Number of leading samples that go to train.
pub fn split_point(count: usize, train_fraction: f64) -> usize {
    let point = (train_fraction * count as f64).floor();
    if point <= 0.0 {
        0
    } else {
        (point as usize).min(count)
    }
}

/// Split every class chronologically and merge the slices.
pub fn split<T: Clone>(
    samples_by_class: &BTreeMap<Label, Vec<T>>,
    train_fraction: f64,
) -> Result<SplitTables<T>> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::InvalidConfigValue {
            field: "split.train_fraction".to_string(),
            message: format!("must be in (0, 1), got {}", train_fraction),
        });
    }

    let mut tables = SplitTables {
        train: Vec::new(),
        test: Vec::new(),
        classes: Vec::with_capacity(samples_by_class.len()),
    };
    for (class, samples) in samples_by_class {
        let point = split_point(samples.len(), train_fraction);
        let (train, test) = samples.split_at(point);
        tables.train.extend_from_slice(train);
        tables.test.extend_from_slice(test);
        tables.classes.push(ClassSplit {
            class: class.clone(),
            total: samples.len(),
            train: train.len(),
            test: test.len(),
        });
    }
    Ok(tables)
}
