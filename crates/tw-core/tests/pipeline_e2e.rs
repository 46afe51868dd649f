//! End-to-end pipeline tests: inputs on disk → samples → features → tables.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tw_common::{ConfigKey, Label, SECS_PER_DAY};
use tw_config::PipelineConfig;
use tw_core::exit_codes::ExitCode;
use tw_core::features::{read_features, FeatureSet};
use tw_core::logging::LogContext;
use tw_core::merge::load_unit;
use tw_core::pipeline::{samples_written, Pipeline, RunReport};
use tw_core::sample::store::{read_manifest, read_sample, unit_dir};
use tw_core::split::split;
use tw_core::table::{read_table, table_dir, SUMMARY_FILE, TEST_FILE, TRAIN_FILE};
use tw_core::test_utils::{daily_edges, edge, write_class_file, TestTimer, T0};
use tw_core::{assert_err, assert_ok};

fn ctx() -> LogContext {
    LogContext::new("test-run", "test-host")
}

fn config(radii: &[u32]) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.radii = radii.to_vec();
    config.workers = 2;
    config
}

fn label(s: &str) -> Label {
    Label(s.to_string())
}

/// Two classes: `email` has 10 busy days, `calls` has gaps.
fn write_inputs(dir: &Path) {
    write_class_file(dir, "email", &daily_edges(&[3; 10]));
    write_class_file(dir, "calls", &daily_edges(&[2, 0, 0, 4, 1]));
}

fn full_run(input: &Path, out: &Path, config: &PipelineConfig) -> RunReport {
    let features = FeatureSet::native(config.features.delta_secs);
    let pipeline = Pipeline::new(config, out, ctx());
    assert_ok!(pipeline.run(input, &features))
}

#[test]
fn generate_writes_manifests_per_class_and_radius() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_inputs(input.path());

    let config = config(&[0, 1]);
    let pipeline = Pipeline::new(&config, out.path(), ctx());
    let batch = assert_ok!(pipeline.generate(input.path()));

    assert!(batch.summary.all_succeeded);
    assert_eq!(batch.summary.total, 4);
    // email: 10 (r0) + 8 (r1); calls: 3 (r0) + 3 (r1)
    assert_eq!(samples_written(&batch), 24);

    let samples = pipeline.layout().samples_root();
    let manifest = assert_ok!(read_manifest(&unit_dir(
        &samples,
        &label("calls"),
        ConfigKey::new(SECS_PER_DAY, 0)
    )));
    let centers: Vec<usize> = manifest.samples.iter().map(|e| e.center).collect();
    assert_eq!(centers, vec![0, 3, 4]);
    let indices: Vec<u64> = manifest.samples.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn gap_yields_empty_middle_bucket() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let edges = [
        edge("A", "B", T0),
        edge("A", "B", T0 + 3_600),
        edge("C", "D", T0 + 2 * SECS_PER_DAY + 100),
    ];
    write_class_file(input.path(), "sparse", &edges);

    let config = config(&[0]);
    let pipeline = Pipeline::new(&config, out.path(), ctx());
    let batch = assert_ok!(pipeline.generate(input.path()));
    let report = &batch.succeeded[0];
    assert_eq!(report.buckets, 3);
    assert_eq!(report.windows, 3);
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped_empty, 1);

    let dir = unit_dir(
        &pipeline.layout().samples_root(),
        &label("sparse"),
        ConfigKey::new(SECS_PER_DAY, 0),
    );
    let manifest = assert_ok!(read_manifest(&dir));
    let first = assert_ok!(read_sample(&dir, &manifest.samples[0]));
    let second = assert_ok!(read_sample(&dir, &manifest.samples[1]));
    assert_eq!(first, edges[..2].to_vec());
    assert_eq!(second, edges[2..].to_vec());
}

#[test]
fn empty_window_contributes_no_rows() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    // Buckets: [x], [], [], [], [x]; radius 1 centers 1, 2, 3 with 2 all-empty.
    write_class_file(input.path(), "bursty", &daily_edges(&[1, 0, 0, 0, 1]));

    let config = config(&[1]);
    let report = full_run(input.path(), out.path(), &config);
    assert!(report.all_succeeded());

    let generated = &report.generate.succeeded[0];
    assert_eq!(generated.windows, 3);
    assert_eq!(generated.written, 2);
    assert_eq!(generated.skipped_empty, 1);

    let tables = table_dir(&out.path().join("tables"), ConfigKey::new(SECS_PER_DAY, 1));
    let train = assert_ok!(read_table(&tables.join(TRAIN_FILE)));
    let test = assert_ok!(read_table(&tables.join(TEST_FILE)));
    assert_eq!(train.len() + test.len(), 2);
}

#[test]
fn full_run_splits_each_class_chronologically() {
    let _timer = TestTimer::new("full_run_splits_each_class_chronologically");
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_inputs(input.path());

    let config = config(&[0]);
    let report = full_run(input.path(), out.path(), &config);
    assert!(report.all_succeeded());
    assert_eq!(report.split.succeeded.len(), 1);

    let summary = &report.split.succeeded[0];
    let counts: Vec<(String, usize, usize)> = summary
        .classes
        .iter()
        .map(|c| (c.class.to_string(), c.train, c.test))
        .collect();
    assert_eq!(
        counts,
        vec![("calls".to_string(), 2, 1), ("email".to_string(), 8, 2)]
    );

    let tables = table_dir(&out.path().join("tables"), ConfigKey::new(SECS_PER_DAY, 0));
    let train = assert_ok!(read_table(&tables.join(TRAIN_FILE)));
    let test = assert_ok!(read_table(&tables.join(TEST_FILE)));
    assert_eq!(train.len(), 10);
    assert_eq!(test.len(), 3);
    assert!(train.iter().all(|(features, _)| features.len() == 13 + 36));

    let train_labels: Vec<&str> = train.iter().map(|(_, l)| l.as_str()).collect();
    assert_eq!(&train_labels[..2], &["calls", "calls"]);
    assert!(train_labels[2..].iter().all(|l| *l == "email"));
}

#[test]
fn split_respects_time_order_per_class() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_inputs(input.path());

    let config = config(&[0]);
    full_run(input.path(), out.path(), &config);

    let key = ConfigKey::new(SECS_PER_DAY, 0);
    let samples = out.path().join("samples");
    let mut by_class = std::collections::BTreeMap::new();
    for class in ["calls", "email"] {
        by_class.insert(label(class), assert_ok!(load_unit(&samples, &label(class), key)));
    }
    let tables = assert_ok!(split(&by_class, 0.8));

    for class in ["calls", "email"] {
        let last_train = tables
            .train
            .iter()
            .filter(|s| s.class.as_str() == class)
            .map(|s| s.last_timestamp)
            .max();
        let first_test = tables
            .test
            .iter()
            .filter(|s| s.class.as_str() == class)
            .map(|s| s.first_timestamp)
            .min();
        if let (Some(train), Some(test)) = (last_train, first_test) {
            assert!(train <= test, "{}: {} > {}", class, train, test);
        }
    }
}

#[test]
fn ten_samples_split_eight_two() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_class_file(input.path(), "email", &daily_edges(&[1; 10]));

    let config = config(&[0]);
    let report = full_run(input.path(), out.path(), &config);
    let summary = &report.split.succeeded[0];
    assert_eq!(summary.train_rows, 8);
    assert_eq!(summary.test_rows, 2);
}

#[test]
fn reruns_produce_identical_tables() {
    let input = TempDir::new().unwrap();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_inputs(input.path());

    let config = config(&[0, 1]);
    full_run(input.path(), first.path(), &config);
    full_run(input.path(), second.path(), &config);

    for key in config.config_keys() {
        for file in [TRAIN_FILE, TEST_FILE, SUMMARY_FILE] {
            let a = fs::read(table_dir(&first.path().join("tables"), key).join(file)).unwrap();
            let b = fs::read(table_dir(&second.path().join("tables"), key).join(file)).unwrap();
            assert_eq!(a, b, "{} for {} differs between runs", file, key);
        }
    }
}

#[test]
fn regenerate_replaces_stale_samples() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_class_file(input.path(), "email", &daily_edges(&[1; 6]));

    let config = config(&[0]);
    let pipeline = Pipeline::new(&config, out.path(), ctx());
    assert_ok!(pipeline.generate(input.path()));

    write_class_file(input.path(), "email", &daily_edges(&[1; 2]));
    let batch = assert_ok!(pipeline.generate(input.path()));
    assert_eq!(samples_written(&batch), 2);

    let dir = unit_dir(
        &pipeline.layout().samples_root(),
        &label("email"),
        ConfigKey::new(SECS_PER_DAY, 0),
    );
    let sample_files = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "edges"))
        .count();
    assert_eq!(sample_files, 2);
}

#[test]
fn unsorted_class_fails_alone() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_class_file(input.path(), "good", &daily_edges(&[1; 4]));
    write_class_file(
        input.path(),
        "shuffled",
        &[edge("a", "b", T0 + 50), edge("a", "b", T0)],
    );

    let config = config(&[0, 1]);
    let report = full_run(input.path(), out.path(), &config);

    assert_eq!(report.generate.summary.succeeded, 2);
    assert_eq!(report.generate.summary.failed, 2);
    assert!(report
        .generate
        .failed
        .iter()
        .all(|f| f.item_id.starts_with("shuffled/") && f.error.code == 30));
    assert_eq!(ExitCode::for_batch(&report.generate), ExitCode::PartialFail);

    // The good class still reaches the tables.
    assert_eq!(report.split.summary.succeeded, 2);
    assert!(!out.path().join("samples").join("shuffled").exists());
}

#[test]
fn extract_features_match_manifest() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_inputs(input.path());

    let config = config(&[1]);
    let pipeline = Pipeline::new(&config, out.path(), ctx());
    assert_ok!(pipeline.generate(input.path()));
    let batch = assert_ok!(pipeline.extract(&FeatureSet::native(3_600)));
    assert!(batch.summary.all_succeeded);

    let dir = unit_dir(
        &pipeline.layout().samples_root(),
        &label("email"),
        ConfigKey::new(SECS_PER_DAY, 1),
    );
    let manifest = assert_ok!(read_manifest(&dir));
    let rows = assert_ok!(read_features(&dir));
    assert_eq!(rows.len(), manifest.samples.len());
    for (row, entry) in rows.iter().zip(&manifest.samples) {
        assert_eq!(row.index, entry.index);
        assert_eq!(row.static_counts.len(), 13);
        assert_eq!(row.temporal_counts.len(), 36);
    }
}

#[test]
fn split_without_samples_errors() {
    let out = TempDir::new().unwrap();
    let config = config(&[0]);
    let pipeline = Pipeline::new(&config, out.path(), ctx());
    let err = pipeline.split().unwrap_err();
    assert_eq!(err.code(), 51);
}

#[test]
fn generate_without_inputs_errors() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let config = config(&[0]);
    let pipeline = Pipeline::new(&config, out.path(), ctx());
    assert_err!(pipeline.generate(input.path()));
}
