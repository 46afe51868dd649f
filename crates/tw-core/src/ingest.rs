//! Edge file ingestion and class discovery.
//!
//! One input file per class. Each non-blank, non-comment line holds
//! `source target timestamp`, separated by whitespace and/or commas.
//! The file stem is the class label.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tw_common::{EdgeRecord, Error, Label, NodeId, Result};

/// A labelled input edge file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInput {
    pub label: Label,
    pub path: PathBuf,
}

/// Parse one input line.
///
/// Returns `Ok(None)` for blank lines and `#` comments. `line_no` is 1-based
/// and only used for error reporting.
pub fn parse_line(line: &str, path: &str, line_no: usize) -> Result<Option<EdgeRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|f| !f.is_empty());

    let invalid = |message: String| Error::InvalidInput {
        path: path.to_string(),
        line: line_no,
        message,
    };

    let (source, target, ts) = match (fields.next(), fields.next(), fields.next()) {
        (Some(s), Some(t), Some(ts)) => (s, t, ts),
        _ => {
            return Err(invalid(
                "expected three fields: source target timestamp".to_string(),
            ))
        }
    };
    if fields.next().is_some() {
        return Err(invalid(
            "expected three fields: source target timestamp".to_string(),
        ));
    }

    let timestamp = ts
        .parse::<i64>()
        .map_err(|_| invalid(format!("timestamp is not an integer: {:?}", ts)))?;

    Ok(Some(EdgeRecord {
        source: NodeId::from(source),
        target: NodeId::from(target),
        timestamp,
    }))
}

/// Read every edge from a reader, preserving file order.
pub fn read_edges_from<R: BufRead>(reader: R, path: &str) -> Result<Vec<EdgeRecord>> {
    let mut edges = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(edge) = parse_line(&line, path, idx + 1)? {
            edges.push(edge);
        }
    }
    Ok(edges)
}

/// Read every edge from a file, preserving file order.
pub fn read_edges(path: &Path) -> Result<Vec<EdgeRecord>> {
    let file = fs::File::open(path)?;
    read_edges_from(BufReader::new(file), &path.display().to_string())
}

/// Derive the class label from a file path's stem.
pub fn label_for(path: &Path) -> Result<Label> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    Label::parse(stem).ok_or_else(|| Error::InvalidLabel(stem.to_string()))
}

/// Discover class inputs under `dir`, sorted by label.
///
/// Every regular, non-hidden file is an input. Two files mapping to the same
/// label are rejected.
pub fn discover_classes(dir: &Path) -> Result<Vec<ClassInput>> {
    if !dir.is_dir() {
        return Err(Error::NoInputs(dir.display().to_string()));
    }

    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden || !path.is_file() {
            continue;
        }
        inputs.push(ClassInput {
            label: label_for(&path)?,
            path,
        });
    }

    if inputs.is_empty() {
        return Err(Error::NoInputs(dir.display().to_string()));
    }

    inputs.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.path.cmp(&b.path)));
    if let Some(pair) = inputs.windows(2).find(|w| w[0].label == w[1].label) {
        return Err(Error::Config(format!(
            "duplicate class label {:?} from {} and {}",
            pair[0].label.as_str(),
            pair[0].path.display(),
            pair[1].path.display()
        )));
    }

    Ok(inputs)
}
