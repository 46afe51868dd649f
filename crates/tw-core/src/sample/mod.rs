//! Sample writer: persists non-empty context windows as indexed samples.

pub mod sink;
pub mod store;

pub use sink::{DirectorySink, MemorySink, SampleSink, StoredSample};
pub use store::{Manifest, ManifestEntry};

use serde::Serialize;
use tracing::debug;
use tw_common::{ConfigKey, EdgeRecord, Label, Result, SampleId};

use crate::logging::event_names;
use crate::window::ContextWindow;

/// Outcome of writing one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub written: usize,
    pub skipped_empty: usize,
}

/// Write every non-empty window of one unit to `sink`.
///
/// Samples get contiguous indices from 0 in window order; the window center
/// is stored alongside. The unit is begun (cleared) first and sealed last.
pub fn write_samples<'b, 'a, I, S>(
    windows: I,
    class: &Label,
    config: ConfigKey,
    sink: &mut S,
) -> Result<WriteStats>
where
    'a: 'b,
    I: IntoIterator<Item = ContextWindow<'b, 'a>>,
    S: SampleSink + ?Sized,
{
    sink.begin(class, config)?;

    let mut stats = WriteStats::default();
    let mut edges: Vec<&EdgeRecord> = Vec::new();
    for window in windows {
        if window.is_empty() {
            debug!(
                target: event_names::WRITE_SKIPPED_EMPTY,
                class = %class,
                config = %config,
                center = window.index,
                "skipping empty window"
            );
            stats.skipped_empty += 1;
            continue;
        }

        edges.clear();
        edges.extend(window.edges());
        let id = SampleId::new(class.clone(), config, stats.written as u64);
        sink.put(&id, window.index, &edges)?;
        stats.written += 1;
    }

    sink.finish()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::bucketize;
    use crate::window::generate_windows;
    use std::fs;
    use tempfile::TempDir;
    use tw_common::Error;

    const DAY: i64 = 86_400;

    /// Directory sink whose slot for one sample index is taken by a
    /// directory, so the rename into place fails.
    struct BlockedSink {
        inner: DirectorySink,
        blocked: SampleId,
    }

    impl SampleSink for BlockedSink {
        fn begin(&mut self, class: &Label, config: ConfigKey) -> Result<()> {
            self.inner.begin(class, config)?;
            let dir = store::unit_dir(self.inner.root(), class, config);
            fs::create_dir(dir.join(self.blocked.file_name()))?;
            Ok(())
        }

        fn put(&mut self, id: &SampleId, center: usize, edges: &[&EdgeRecord]) -> Result<()> {
            self.inner.put(id, center, edges)
        }

        fn finish(&mut self) -> Result<()> {
            self.inner.finish()
        }
    }

    #[test]
    fn test_empty_windows_dropped_and_indices_contiguous() {
        // Buckets: [e0], [], [], [e1]
        let edges = [EdgeRecord::new("a", "b", 0), EdgeRecord::new("b", "c", 3 * DAY)];
        let buckets = bucketize(&edges, DAY).unwrap();
        let class = Label("email".into());
        let config = ConfigKey::new(DAY, 0);
        let mut sink = MemorySink::new();

        let stats =
            write_samples(generate_windows(&buckets, 0), &class, config, &mut sink).unwrap();
        assert_eq!(
            stats,
            WriteStats {
                written: 2,
                skipped_empty: 2
            }
        );

        let samples = sink.samples(&class, config);
        assert_eq!(samples.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(samples.iter().map(|s| s.center).collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(samples[1].edges, vec![edges[1].clone()]);
    }

    #[test]
    fn test_window_with_empty_center_but_edges_kept() {
        // Buckets: [e0], [], [e1]; radius 1 -> single window, center empty.
        let edges = [EdgeRecord::new("a", "b", 0), EdgeRecord::new("b", "c", 2 * DAY)];
        let buckets = bucketize(&edges, DAY).unwrap();
        let class = Label("email".into());
        let config = ConfigKey::new(DAY, 1);
        let mut sink = MemorySink::new();

        let stats =
            write_samples(generate_windows(&buckets, 1), &class, config, &mut sink).unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(sink.samples(&class, config)[0].edges.len(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_manifest() {
        let tmp = TempDir::new().unwrap();
        let edges = [
            EdgeRecord::new("a", "b", 0),
            EdgeRecord::new("b", "c", DAY),
            EdgeRecord::new("c", "d", 2 * DAY),
        ];
        let buckets = bucketize(&edges, DAY).unwrap();
        let class = Label("email".into());
        let config = ConfigKey::new(DAY, 0);
        let dir = store::unit_dir(tmp.path(), &class, config);

        // A complete earlier run of the same unit.
        let mut sink = DirectorySink::new(tmp.path(), ' ');
        write_samples(generate_windows(&buckets, 0), &class, config, &mut sink).unwrap();
        assert_eq!(store::list_units(tmp.path()).unwrap(), vec![(class.clone(), config)]);

        let mut sink = BlockedSink {
            inner: DirectorySink::new(tmp.path(), ' '),
            blocked: SampleId::new(class.clone(), config, 1),
        };
        let err = write_samples(generate_windows(&buckets, 0), &class, config, &mut sink)
            .unwrap_err();
        match &err {
            Error::StorageWrite {
                class: c,
                config: k,
                index,
                ..
            } => {
                assert_eq!(c, "email");
                assert_eq!(k, "b86400-r0");
                assert_eq!(*index, Some(1));
            }
            other => panic!("expected StorageWrite, got {other:?}"),
        }
        assert_eq!(err.code(), 50);

        assert!(dir.join("000000.edges").is_file());
        assert!(!dir.join("000001.edges").is_file());
        assert!(!dir.join("000002.edges").exists());
        assert!(!dir.join(store::MANIFEST_FILE).exists());
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");

        assert!(store::list_units(tmp.path()).unwrap().is_empty());
    }
}
