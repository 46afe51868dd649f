//! Pipeline orchestration over (class, configuration) units.
//!
//! ```text
//! generate: ingest → bucket → window → write   one unit per class × radius
//! extract:  manifest → features.csv            one unit per sample set
//! split:    merge → split → tables             one item per configuration
//! ```
//!
//! Units are independent. They fan out over scoped worker threads in chunks
//! of `workers`; a failing unit is recorded in the stage's [`BatchResult`]
//! and never affects its siblings.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use tw_common::error::{BatchResult, StructuredError};
use tw_common::{ConfigKey, EdgeRecord, Error, Label, Result};
use tw_config::{ConfigSnapshot, PipelineConfig};

use crate::bucket::bucketize;
use crate::features::{extract_features, FeatureSet};
use crate::ingest::{self, ClassInput};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::merge::{load_unit, LabeledSample};
use crate::sample::{store, write_samples, DirectorySink};
use crate::split::split;
use crate::table::{write_tables, TableSummary};
use crate::window::generate_windows;

pub const SAMPLES_DIR: &str = "samples";
pub const TABLES_DIR: &str = "tables";
pub const RUN_FILE: &str = "run.json";

/// Locations under the output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn samples_root(&self) -> PathBuf {
        self.root.join(SAMPLES_DIR)
    }

    pub fn tables_root(&self) -> PathBuf {
        self.root.join(TABLES_DIR)
    }

    pub fn run_file(&self) -> PathBuf {
        self.root.join(RUN_FILE)
    }
}

/// A failure confined to one unit of work.
#[derive(Debug)]
pub struct UnitError {
    pub stage: Stage,
    pub class: Label,
    pub config: ConfigKey,
    pub error: Error,
}

impl UnitError {
    pub fn new(stage: Stage, class: &Label, config: ConfigKey, error: Error) -> Self {
        UnitError {
            stage,
            class: class.clone(),
            config,
            error,
        }
    }

    pub fn to_structured(&self) -> StructuredError {
        unit_structured(&self.error, self.stage, &self.class, self.config)
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for class {} (bucket {}s, radius {}): {}",
            self.stage, self.class, self.config.bucket_secs, self.config.radius, self.error
        )
    }
}

impl std::error::Error for UnitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

fn unit_structured(error: &Error, stage: Stage, class: &Label, config: ConfigKey) -> StructuredError {
    StructuredError::from(error)
        .with_context("stage", stage)
        .with_context("class", class)
        .with_context("bucket_secs", config.bucket_secs)
        .with_context("radius", config.radius)
}

/// Outcome of generating one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub class: Label,
    pub config: String,
    pub edges: usize,
    pub buckets: usize,
    pub windows: usize,
    pub written: usize,
    pub skipped_empty: usize,
}

/// Outcome of extracting features for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub class: Label,
    pub config: String,
    pub samples: usize,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub generate: BatchResult<UnitReport>,
    pub extract: BatchResult<ExtractReport>,
    pub split: BatchResult<TableSummary>,
}

impl RunReport {
    pub fn samples_written(&self) -> usize {
        samples_written(&self.generate)
    }

    pub fn all_succeeded(&self) -> bool {
        self.generate.summary.all_succeeded
            && self.extract.summary.all_succeeded
            && self.split.summary.all_succeeded
    }
}

/// Total samples written across a generate batch.
pub fn samples_written(batch: &BatchResult<UnitReport>) -> usize {
    batch.succeeded.iter().map(|u| u.written).sum()
}

/// Run `work` over `units` on scoped threads, `workers` at a time.
///
/// Results keep the order of `units`.
fn fan_out<U, R, K, F>(
    workers: usize,
    stage: Stage,
    units: &[U],
    key: K,
    work: F,
) -> Vec<std::result::Result<R, UnitError>>
where
    U: Sync,
    R: Send,
    K: Fn(&U) -> (Label, ConfigKey),
    F: Fn(&U) -> std::result::Result<R, UnitError> + Sync,
{
    let work = &work;
    units
        .chunks(workers.max(1))
        .flat_map(|chunk| {
            thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|unit| (unit, s.spawn(move || work(unit))))
                    .collect();

                handles
                    .into_iter()
                    .map(|(unit, h)| {
                        h.join().unwrap_or_else(|_| {
                            error!("unit worker thread panicked");
                            let (class, config) = key(unit);
                            Err(UnitError::new(
                                stage,
                                &class,
                                config,
                                Error::Io(std::io::Error::other("unit worker panicked")),
                            ))
                        })
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect()
}

/// Drives the stages for one configuration and output root.
#[derive(Debug)]
pub struct Pipeline<'c> {
    config: &'c PipelineConfig,
    layout: OutputLayout,
    ctx: LogContext,
}

impl<'c> Pipeline<'c> {
    pub fn new(config: &'c PipelineConfig, out_dir: impl Into<PathBuf>, ctx: LogContext) -> Self {
        Pipeline {
            config,
            layout: OutputLayout::new(out_dir),
            ctx,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Record the effective configuration as `run.json`.
    pub fn write_run_file(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        fs::create_dir_all(self.layout.root())?;
        let mut json = snapshot.to_json()?.into_bytes();
        json.push(b'\n');
        store::atomic_write(&self.layout.run_file(), &json)?;
        Ok(())
    }

    /// Discover inputs under `input_dir` and generate every unit.
    pub fn generate(&self, input_dir: &Path) -> Result<BatchResult<UnitReport>> {
        let classes = ingest::discover_classes(input_dir)?;
        for class in &classes {
            info!(
                target: event_names::INGEST_CLASS_FOUND,
                class = %class.label,
                path = %class.path.display(),
                "found class input"
            );
        }
        Ok(self.generate_classes(&classes))
    }

    /// Generate every (class, radius) unit of `classes`.
    pub fn generate_classes(&self, classes: &[ClassInput]) -> BatchResult<UnitReport> {
        let keys = self.config.config_keys();
        let mut batch = BatchResult::default();

        let mut loaded: Vec<(Label, Vec<EdgeRecord>)> = Vec::with_capacity(classes.len());
        for input in classes {
            match ingest::read_edges(&input.path) {
                Ok(edges) => loaded.push((input.label.clone(), edges)),
                Err(error) => {
                    for &config in &keys {
                        self.record_error(&mut batch, Stage::Ingest, &input.label, config, &error);
                    }
                }
            }
        }
        info!(
            target: event_names::INGEST_FINISHED,
            classes = loaded.len(),
            edges = loaded.iter().map(|(_, e)| e.len()).sum::<usize>(),
            "ingest finished"
        );

        let units: Vec<(&Label, &[EdgeRecord], ConfigKey)> = loaded
            .iter()
            .flat_map(|(label, edges)| keys.iter().map(move |&k| (label, edges.as_slice(), k)))
            .collect();

        let results = fan_out(
            self.config.workers,
            Stage::Write,
            &units,
            |&(class, _, config)| (class.clone(), config),
            |&(class, edges, config)| self.generate_unit(class, edges, config),
        );
        self.collect(&mut batch, results);
        batch
    }

    fn generate_unit(
        &self,
        class: &Label,
        edges: &[EdgeRecord],
        config: ConfigKey,
    ) -> std::result::Result<UnitReport, UnitError> {
        let _span = info_span!(
            "unit",
            run_id = %self.ctx.run_id,
            class = %class,
            config = %config
        )
        .entered();
        debug!(target: event_names::UNIT_STARTED, edges = edges.len(), "unit started");

        let buckets = bucketize(edges, config.bucket_secs)
            .map_err(|e| UnitError::new(Stage::Bucket, class, config, e))?;
        let windows = generate_windows(&buckets, config.radius);
        let window_count = windows.len();
        if window_count == 0 {
            warn!(
                target: event_names::WINDOW_NONE_PRODUCED,
                buckets = buckets.len(),
                radius = config.radius,
                "radius too large for the data span; no windows produced"
            );
        }

        let mut sink = DirectorySink::new(
            self.layout.samples_root(),
            self.config.output.delimiter.as_char(),
        );
        let stats = write_samples(windows, class, config, &mut sink)
            .map_err(|e| UnitError::new(Stage::Write, class, config, e))?;

        info!(
            target: event_names::UNIT_FINISHED,
            buckets = buckets.len(),
            windows = window_count,
            written = stats.written,
            skipped_empty = stats.skipped_empty,
            "unit finished"
        );
        Ok(UnitReport {
            class: class.clone(),
            config: config.to_string(),
            edges: edges.len(),
            buckets: buckets.len(),
            windows: window_count,
            written: stats.written,
            skipped_empty: stats.skipped_empty,
        })
    }

    /// Extract features for every persisted unit.
    pub fn extract(&self, features: &FeatureSet) -> Result<BatchResult<ExtractReport>> {
        let units = store::list_units(&self.layout.samples_root())?;
        Ok(self.extract_units(&units, features))
    }

    /// Extract features for the given units.
    pub fn extract_units(
        &self,
        units: &[(Label, ConfigKey)],
        features: &FeatureSet,
    ) -> BatchResult<ExtractReport> {
        let samples_root = self.layout.samples_root();
        let results = fan_out(
            self.config.workers,
            Stage::Extract,
            units,
            |unit| unit.clone(),
            |(class, config)| {
                let _span = info_span!(
                    "unit",
                    run_id = %self.ctx.run_id,
                    stage = %Stage::Extract,
                    class = %class,
                    config = %config
                )
                .entered();
                let dir = store::unit_dir(&samples_root, class, *config);
                let rows = extract_features(&dir, features)
                    .map_err(|e| UnitError::new(Stage::Extract, class, *config, e))?;
                info!(
                    target: event_names::UNIT_FINISHED,
                    samples = rows.len(),
                    "features extracted"
                );
                Ok(ExtractReport {
                    class: class.clone(),
                    config: config.to_string(),
                    samples: rows.len(),
                })
            },
        );

        let mut batch = BatchResult::default();
        self.collect(&mut batch, results);
        batch
    }

    /// Merge and split every configuration found on disk.
    pub fn split(&self) -> Result<BatchResult<TableSummary>> {
        let units = store::list_units(&self.layout.samples_root())?;
        Ok(self.split_units(&units))
    }

    /// Merge and split the given units, one table set per configuration.
    pub fn split_units(&self, units: &[(Label, ConfigKey)]) -> BatchResult<TableSummary> {
        let mut by_config: BTreeMap<ConfigKey, Vec<&Label>> = BTreeMap::new();
        for (class, config) in units {
            by_config.entry(*config).or_default().push(class);
        }

        let samples_root = self.layout.samples_root();
        let tables_root = self.layout.tables_root();
        let fraction = self.config.split.train_fraction;
        let mut batch = BatchResult::default();

        for (config, classes) in by_config {
            let merged: std::result::Result<BTreeMap<Label, Vec<LabeledSample>>, UnitError> =
                classes
                    .into_iter()
                    .map(|class| {
                        load_unit(&samples_root, class, config)
                            .map(|rows| (class.clone(), rows))
                            .map_err(|e| UnitError::new(Stage::Merge, class, config, e))
                    })
                    .collect();

            let result = merged.and_then(|by_class| {
                let any = Label("*".to_string());
                let tables = split(&by_class, fraction)
                    .map_err(|e| UnitError::new(Stage::Split, &any, config, e))?;
                write_tables(&tables_root, config, fraction, &tables)
                    .map_err(|e| UnitError::new(Stage::Split, &any, config, e))
            });

            match result {
                Ok(summary) => {
                    info!(
                        target: event_names::SPLIT_TABLE_WRITTEN,
                        config = %config,
                        train_rows = summary.train_rows,
                        test_rows = summary.test_rows,
                        "tables written"
                    );
                    batch.add_success(summary);
                }
                Err(unit) => self.record_failure(&mut batch, unit),
            }
        }
        batch
    }

    /// Generate, extract and split in sequence.
    ///
    /// Later stages only see units that completed the stage before.
    pub fn run(&self, input_dir: &Path, features: &FeatureSet) -> Result<RunReport> {
        log_event!(
            self.ctx,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            "pipeline run started",
            radii = format!("{:?}", self.config.radii).as_str(),
            workers = self.config.workers
        );

        let generate = self.generate(input_dir)?;
        let generated: Vec<(Label, ConfigKey)> = generate
            .succeeded
            .iter()
            .filter_map(|u| ConfigKey::parse(&u.config).map(|k| (u.class.clone(), k)))
            .collect();

        let extract = self.extract_units(&generated, features);
        let extracted: Vec<(Label, ConfigKey)> = extract
            .succeeded
            .iter()
            .filter_map(|u| ConfigKey::parse(&u.config).map(|k| (u.class.clone(), k)))
            .collect();

        let split = self.split_units(&extracted);

        let report = RunReport {
            run_id: self.ctx.run_id.clone(),
            generate,
            extract,
            split,
        };
        log_event!(
            self.ctx,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Report,
            "pipeline run finished",
            samples = report.samples_written(),
            all_succeeded = report.all_succeeded()
        );
        Ok(report)
    }

    fn collect<R>(
        &self,
        batch: &mut BatchResult<R>,
        results: Vec<std::result::Result<R, UnitError>>,
    ) {
        for result in results {
            match result {
                Ok(report) => batch.add_success(report),
                Err(unit) => self.record_failure(batch, unit),
            }
        }
    }

    fn record_failure<R>(&self, batch: &mut BatchResult<R>, unit: UnitError) {
        self.record_error(batch, unit.stage, &unit.class, unit.config, &unit.error);
    }

    fn record_error<R>(
        &self,
        batch: &mut BatchResult<R>,
        stage: Stage,
        class: &Label,
        config: ConfigKey,
        error: &Error,
    ) {
        log_event!(
            self.ctx,
            ERROR,
            event_names::UNIT_FAILED,
            stage,
            "unit failed",
            class = class.as_str(),
            config = config.to_string().as_str(),
            error = error.to_string().as_str()
        );
        batch.add_failure(
            format!("{}/{}", class, config),
            unit_structured(error, stage, class, config),
        );
    }
}
