//! Binary-level tests for `stress-run`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn workspace(tests_json: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("tests.json"), tests_json).unwrap();
    dir
}

fn stress_run(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stress-run").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn lists_builtin_actions() {
    Command::cargo_bin("stress-run")
        .unwrap()
        .arg("--list-actions")
        .assert()
        .success()
        .stdout(predicate::str::contains("echo"))
        .stdout(predicate::str::contains("sleep"))
        .stdout(predicate::str::contains("command"));
}

#[test]
fn tests_file_is_required() {
    Command::cargo_bin("stress-run")
        .unwrap()
        .assert()
        .failure();
}

#[test]
fn clean_echo_run_exits_zero_with_json_report() {
    let dir = workspace(r#"[{"action": "echo", "threads": 3}]"#);

    let output = stress_run(&dir)
        .args(["tests.json", "--duration", "1", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["had_errors"], false);
    assert_eq!(report["total_fails"], 0);
    assert_eq!(report["per_worker"].as_array().unwrap().len(), 3);
    assert_eq!(report["stop_reason"]["kind"], "duration_elapsed");

    // Default debug log lands in the working directory
    assert!(dir.path().join("stress.debug.log").exists());
}

#[test]
fn failing_command_exits_one() {
    let dir = workspace(r#"[{"action": "command", "kwargs": {"command": "false"}}]"#);

    stress_run(&dir)
        .args(["tests.json", "-n", "3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Run 3 actions (3 failed)"));
}

#[test]
fn stop_on_error_ends_long_run_early() {
    let dir = workspace(
        r#"[
            {"action": "echo", "threads": 2},
            {"action": "command", "kwargs": {"command": "exit 3"}}
        ]"#,
    );

    stress_run(&dir)
        .args(["tests.json", "--duration", "600", "--stop-on-error", "--json"])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .failure()
        .stdout(predicate::str::contains("worker_failed"));
}

#[test]
fn serial_mode_prints_one_report_per_test() {
    let dir = workspace(
        r#"[
            {"action": "echo"},
            {"action": "sleep", "threads": 2, "kwargs": {"duration_ms": 5}}
        ]"#,
    );

    let output = stress_run(&dir)
        .args(["tests.json", "-n", "2", "--serial", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["total_runs"], 2);
    assert_eq!(reports[1]["total_runs"], 4);
}

#[test]
fn unknown_action_is_fatal() {
    let dir = workspace(r#"[{"action": "server_create_destroy"}]"#);

    stress_run(&dir)
        .args(["tests.json", "-d", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action"));
}

#[test]
fn missing_tests_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    stress_run(&dir)
        .arg("nope.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read tests file"));
}

#[test]
fn malformed_config_is_fatal() {
    let dir = workspace(r#"[{"action": "echo"}]"#);
    fs::write(dir.path().join("stress.toml"), "[stress\nbroken").unwrap();

    stress_run(&dir)
        .args(["tests.json", "-c", "stress.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn debug_log_flag_overrides_config() {
    let dir = workspace(r#"[{"action": "echo"}]"#);
    fs::write(
        dir.path().join("stress.toml"),
        "[logging]\ndebug_log = \"from-config.log\"\n",
    )
    .unwrap();

    stress_run(&dir)
        .args([
            "tests.json",
            "-c",
            "stress.toml",
            "-n",
            "1",
            "--debug-log",
            "from-flag.log",
        ])
        .assert()
        .success();

    assert!(dir.path().join("from-flag.log").exists());
    assert!(!dir.path().join("from-config.log").exists());
}

#[test]
fn unwritable_debug_log_is_reported() {
    let dir = workspace(r#"[{"action": "echo"}]"#);

    stress_run(&dir)
        .args(["tests.json", "-n", "1", "--debug-log", "no/such/dir/debug.log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to initialize logging"));
}

#[test]
fn oversized_duration_does_not_panic() {
    let dir = workspace(r#"[{"action": "command", "kwargs": {"command": "false"}}]"#);

    stress_run(&dir)
        .args(["tests.json", "-d", "18446744073709551615", "--stop-on-error"])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("panicked").not());
}
