//! On-disk sample set layout and manifest.
//!
//! ```text
//! <samples>/<class>/<config>/<index:06>.edges
//! <samples>/<class>/<config>/manifest.json
//! ```
//!
//! The manifest is the authoritative sample order; directory listing order
//! is never consulted.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use tw_common::{ConfigKey, EdgeRecord, Error, Label, Result};

use crate::ingest;

/// Manifest file name inside a unit directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Schema version of `manifest.json`.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

/// Ordered index of one (class, configuration) sample set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub class: Label,
    pub config: String,
    pub samples: Vec<ManifestEntry>,
}

/// One persisted sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Chronological sort key, contiguous from 0.
    pub index: u64,
    /// Center bucket index of the source window.
    pub center: usize,
    pub file: String,
    pub edge_count: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    /// Hex SHA-256 of the sample file contents.
    pub sha256: String,
}

impl Manifest {
    pub fn new(class: &Label, config: ConfigKey) -> Self {
        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            class: class.clone(),
            config: config.to_string(),
            samples: Vec::new(),
        }
    }

    /// Check that indices are contiguous from 0 and in order.
    pub fn validate(&self) -> Result<()> {
        for (pos, entry) in self.samples.iter().enumerate() {
            if entry.index != pos as u64 {
                return Err(Error::ManifestCorrupted(format!(
                    "{}/{}: entry {} has index {}",
                    self.class, self.config, pos, entry.index
                )));
            }
        }
        Ok(())
    }
}

/// Directory holding one unit's samples.
pub fn unit_dir(samples_root: &Path, class: &Label, config: ConfigKey) -> PathBuf {
    samples_root.join(class.as_str()).join(config.to_string())
}

/// Hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `bytes` to `path` through a temporary sibling and a rename.
///
/// On failure no file exists under `path` unless one was there before.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Serialize sample edges as delimited rows in original order.
pub fn encode_sample<'e>(edges: impl IntoIterator<Item = &'e EdgeRecord>, delimiter: char) -> Vec<u8> {
    let mut out = String::new();
    for e in edges {
        out.push_str(e.source.as_str());
        out.push(delimiter);
        out.push_str(e.target.as_str());
        out.push(delimiter);
        out.push_str(&e.timestamp.to_string());
        out.push('\n');
    }
    out.into_bytes()
}

/// Load and validate a unit's manifest.
pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(Error::SampleSetNotFound {
            path: dir.display().to_string(),
        });
    }
    let content = fs::read_to_string(&path)?;
    let manifest: Manifest = serde_json::from_str(&content)
        .map_err(|e| Error::ManifestCorrupted(format!("{}: {}", path.display(), e)))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Write a unit's manifest atomically.
pub fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(manifest)?;
    json.push(b'\n');
    atomic_write(&dir.join(MANIFEST_FILE), &json).map_err(|source| Error::StorageWrite {
        class: manifest.class.to_string(),
        config: manifest.config.clone(),
        index: None,
        source,
    })
}

/// Read one sample's edges, verifying its checksum against the manifest.
pub fn read_sample(dir: &Path, entry: &ManifestEntry) -> Result<Vec<EdgeRecord>> {
    let path = dir.join(&entry.file);
    let bytes = fs::read(&path)?;
    if sha256_hex(&bytes) != entry.sha256 {
        return Err(Error::ManifestCorrupted(format!(
            "checksum mismatch for {}",
            path.display()
        )));
    }
    ingest::read_edges_from(bytes.as_slice(), &path.display().to_string())
}

/// Enumerate persisted units under `samples_root`, sorted by class then config.
///
/// Only directories named like a configuration key and holding a manifest
/// count as units.
pub fn list_units(samples_root: &Path) -> Result<Vec<(Label, ConfigKey)>> {
    if !samples_root.is_dir() {
        return Err(Error::SampleSetNotFound {
            path: samples_root.display().to_string(),
        });
    }

    let mut units = Vec::new();
    for class_entry in fs::read_dir(samples_root)? {
        let class_path = class_entry?.path();
        let Some(label) = class_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(Label::parse)
        else {
            continue;
        };
        if !class_path.is_dir() {
            continue;
        }
        for config_entry in fs::read_dir(&class_path)? {
            let config_path = config_entry?.path();
            let key = config_path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(ConfigKey::parse);
            if let Some(key) = key {
                if config_path.join(MANIFEST_FILE).is_file() {
                    units.push((label.clone(), key));
                }
            }
        }
    }
    units.sort();
    Ok(units)
}
