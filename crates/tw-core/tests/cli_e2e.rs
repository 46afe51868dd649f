//! CLI end-to-end tests for tw-core.
//!
//! These tests run the real binary against temporary inputs and verify
//! outputs, on-disk layout and exit codes.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const T0: i64 = 1_609_459_200;
const DAY: i64 = 86_400;

/// Get a Command for the tw-core binary with an isolated config lookup.
fn tw_core(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tw-core").expect("tw-core binary should exist");
    cmd.env_remove("TEMPORAL_WINDOWS_CONFIG")
        .env_remove("TW_CONFIG_DIR")
        .env_remove("TW_LOG")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", home);
    cmd
}

fn write_class(dir: &Path, label: &str, days: &[usize]) {
    let mut text = String::from("# source target timestamp\n");
    for (day, &count) in days.iter().enumerate() {
        for k in 0..count {
            let ts = T0 + day as i64 * DAY + k as i64 * 60;
            text.push_str(&format!("n{} n{} {}\n", k, k + 1, ts));
        }
    }
    fs::write(dir.join(format!("{}.txt", label)), text).unwrap();
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("pipeline.toml");
    fs::write(&path, body).unwrap();
    path
}

// ============================================================================
// Help and version
// ============================================================================

mod help {
    use super::*;

    #[test]
    fn help_lists_subcommands() {
        let home = TempDir::new().unwrap();
        tw_core(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("generate"))
            .stdout(predicate::str::contains("extract"))
            .stdout(predicate::str::contains("split"))
            .stdout(predicate::str::contains("inspect"));
    }

    #[test]
    fn version_json() {
        let home = TempDir::new().unwrap();
        tw_core(home.path())
            .args(["version", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("tw_core_version"));
    }

    #[test]
    fn unknown_command_fails() {
        let home = TempDir::new().unwrap();
        tw_core(home.path())
            .arg("nonexistent-command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn generate_requires_input() {
        let home = TempDir::new().unwrap();
        tw_core(home.path())
            .args(["generate", "--out", "/tmp/nowhere"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--input"));
    }
}

// ============================================================================
// Pipeline commands
// ============================================================================

mod pipeline {
    use super::*;

    #[test]
    fn run_writes_full_layout() {
        let home = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_class(input.path(), "email", &[2; 10]);
        write_class(input.path(), "calls", &[1, 0, 3, 1]);

        let output = tw_core(home.path())
            .args(["run", "--format", "json", "--input"])
            .arg(input.path())
            .arg("--out")
            .arg(out.path())
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(0));

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["generate"]["summary"]["all_succeeded"], true);
        assert_eq!(report["split"]["summary"]["succeeded"], 2);

        let root = out.path();
        assert!(root.join("run.json").is_file());
        for config in ["b86400-r0", "b86400-r1"] {
            assert!(root.join("samples/email").join(config).join("manifest.json").is_file());
            assert!(root.join("samples/email").join(config).join("features.csv").is_file());
            assert!(root.join("tables").join(config).join("train.csv").is_file());
            assert!(root.join("tables").join(config).join("test.csv").is_file());
            assert!(root.join("tables").join(config).join("summary.json").is_file());
        }
        assert!(root.join("samples/email/b86400-r0/000009.edges").is_file());
    }

    #[test]
    fn staged_commands_match_run() {
        let home = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let staged = TempDir::new().unwrap();
        let whole = TempDir::new().unwrap();
        write_class(input.path(), "email", &[2; 6]);

        tw_core(home.path())
            .args(["generate", "-f", "summary", "--input"])
            .arg(input.path())
            .arg("--out")
            .arg(staged.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("generate: 2 ok"));
        tw_core(home.path())
            .args(["extract", "-f", "summary", "--out"])
            .arg(staged.path())
            .assert()
            .success();
        tw_core(home.path())
            .args(["split", "-f", "summary", "--out"])
            .arg(staged.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("split: 2 ok"));

        tw_core(home.path())
            .args(["run", "-f", "exitcode", "--input"])
            .arg(input.path())
            .arg("--out")
            .arg(whole.path())
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        for file in ["train.csv", "test.csv"] {
            let a = fs::read(staged.path().join("tables/b86400-r1").join(file)).unwrap();
            let b = fs::read(whole.path().join("tables/b86400-r1").join(file)).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn no_samples_exit_code() {
        let home = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let config = write_config(home.path(), "radii = [3]\n");
        write_class(input.path(), "email", &[1, 1]);

        tw_core(home.path())
            .arg("--config")
            .arg(&config)
            .args(["generate", "-f", "exitcode", "--input"])
            .arg(input.path())
            .arg("--out")
            .arg(out.path())
            .assert()
            .code(1);
    }

    #[test]
    fn unsorted_class_is_partial_failure() {
        let home = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_class(input.path(), "email", &[1, 1, 1]);
        fs::write(
            input.path().join("broken.txt"),
            format!("a b {}\na b {}\n", T0 + 100, T0),
        )
        .unwrap();

        tw_core(home.path())
            .args(["generate", "-f", "summary", "--input"])
            .arg(input.path())
            .arg("--out")
            .arg(out.path())
            .assert()
            .code(3)
            .stderr(predicate::str::contains("broken/b86400-r0"));
    }

    #[test]
    fn empty_input_dir_is_args_error() {
        let home = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();

        tw_core(home.path())
            .args(["generate", "-f", "json", "--input"])
            .arg(input.path())
            .arg("--out")
            .arg(out.path())
            .assert()
            .code(10)
            .stderr(predicate::str::contains("\"status\": \"error\""));
    }

    #[test]
    fn inspect_reports_buckets_and_windows() {
        let home = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        write_class(input.path(), "email", &[1, 0, 0, 2, 1]);

        let output = tw_core(home.path())
            .args(["inspect", "-f", "json", "--radius", "0,1,2"])
            .arg(input.path().join("email.txt"))
            .output()
            .unwrap();
        assert!(output.status.success());

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["edges"], 4);
        assert_eq!(report["buckets"], 5);
        assert_eq!(report["empty_buckets"], 2);
        assert_eq!(report["windows"][0]["windows"], 5);
        assert_eq!(report["windows"][0]["non_empty"], 3);
        assert_eq!(report["windows"][2]["windows"], 1);
        assert_eq!(report["first_timestamp"], "2021-01-01T00:00:00+00:00");
    }
}

// ============================================================================
// Configuration commands
// ============================================================================

mod config {
    use super::*;

    #[test]
    fn show_defaults() {
        let home = TempDir::new().unwrap();
        tw_core(home.path())
            .args(["config", "show", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config_hash"))
            .stdout(predicate::str::contains("builtin default"));
    }

    #[test]
    fn validate_good_file() {
        let home = TempDir::new().unwrap();
        let path = write_config(home.path(), "radii = [0, 2]\n[split]\ntrain_fraction = 0.7\n");
        tw_core(home.path())
            .args(["config", "validate", "-f", "json"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"valid\""));
    }

    #[test]
    fn validate_rejects_bad_fraction() {
        let home = TempDir::new().unwrap();
        let path = write_config(home.path(), "[split]\ntrain_fraction = 1.5\n");
        tw_core(home.path())
            .args(["config", "validate", "-f", "json"])
            .arg(&path)
            .assert()
            .code(10)
            .stderr(predicate::str::contains("train_fraction"));
    }

    #[test]
    fn missing_config_file_is_args_error() {
        let home = TempDir::new().unwrap();
        tw_core(home.path())
            .args(["--config", "/nonexistent/pipeline.toml", "config", "show"])
            .assert()
            .code(10);
    }
}
