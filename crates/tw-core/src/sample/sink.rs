//! Sample destinations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tw_common::{ConfigKey, EdgeRecord, Error, Label, Result, SampleId};

use super::store::{self, Manifest, ManifestEntry};

/// Destination for the samples of one (class, configuration) unit at a time.
pub trait SampleSink {
    /// Prepare an empty destination for a unit, discarding earlier output.
    fn begin(&mut self, class: &Label, config: ConfigKey) -> Result<()>;

    /// Store one non-empty sample.
    fn put(&mut self, id: &SampleId, center: usize, edges: &[&EdgeRecord]) -> Result<()>;

    /// Seal the unit begun last.
    fn finish(&mut self) -> Result<()>;
}

/// Writes sample files plus `manifest.json` under a samples root.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    delimiter: char,
    current: Option<(PathBuf, Manifest)>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, delimiter: char) -> Self {
        DirectorySink {
            root: root.into(),
            delimiter,
            current: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SampleSink for DirectorySink {
    fn begin(&mut self, class: &Label, config: ConfigKey) -> Result<()> {
        let dir = store::unit_dir(&self.root, class, config);
        let storage_err = |source| Error::StorageWrite {
            class: class.to_string(),
            config: config.to_string(),
            index: None,
            source,
        };
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(storage_err)?;
        }
        fs::create_dir_all(&dir).map_err(storage_err)?;
        self.current = Some((dir, Manifest::new(class, config)));
        Ok(())
    }

    fn put(&mut self, id: &SampleId, center: usize, edges: &[&EdgeRecord]) -> Result<()> {
        let (dir, manifest) = self
            .current
            .as_mut()
            .ok_or_else(|| Error::Config("sample written before unit was begun".to_string()))?;

        let bytes = store::encode_sample(edges.iter().copied(), self.delimiter);
        let file = id.file_name();
        store::atomic_write(&dir.join(&file), &bytes).map_err(|source| Error::StorageWrite {
            class: id.class.to_string(),
            config: id.config.to_string(),
            index: Some(id.index),
            source,
        })?;

        manifest.samples.push(ManifestEntry {
            index: id.index,
            center,
            file,
            edge_count: edges.len(),
            first_timestamp: edges.first().map(|e| e.timestamp).unwrap_or_default(),
            last_timestamp: edges.last().map(|e| e.timestamp).unwrap_or_default(),
            sha256: store::sha256_hex(&bytes),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.current.take() {
            Some((dir, manifest)) => store::write_manifest(&dir, &manifest),
            None => Ok(()),
        }
    }
}

/// A sample held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSample {
    pub index: u64,
    pub center: usize,
    pub edges: Vec<EdgeRecord>,
}

/// In-memory sink, keyed by unit.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub units: BTreeMap<(Label, ConfigKey), Vec<StoredSample>>,
    current: Option<(Label, ConfigKey)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self, class: &Label, config: ConfigKey) -> &[StoredSample] {
        self.units
            .get(&(class.clone(), config))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl SampleSink for MemorySink {
    fn begin(&mut self, class: &Label, config: ConfigKey) -> Result<()> {
        let key = (class.clone(), config);
        self.units.insert(key.clone(), Vec::new());
        self.current = Some(key);
        Ok(())
    }

    fn put(&mut self, id: &SampleId, center: usize, edges: &[&EdgeRecord]) -> Result<()> {
        let key = self
            .current
            .as_ref()
            .ok_or_else(|| Error::Config("sample written before unit was begun".to_string()))?;
        self.units.entry(key.clone()).or_default().push(StoredSample {
            index: id.index,
            center,
            edges: edges.iter().map(|e| (*e).clone()).collect(),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}
