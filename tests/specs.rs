// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level CLI specs: exit codes, report shape, and the status
//! index, driven through the real `obr` binary.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use serial_test::serial;

fn obr(runs_root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("obr").unwrap();
    cmd.arg("--runs-root").arg(runs_root);
    cmd.env_remove("OI_BRIDGE_COMMAND");
    cmd.env_remove("OI_BRIDGE_ARGS");
    cmd
}

#[test]
#[serial]
fn unparseable_web_task_exits_invalid_args() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs"))
        .args(["run", "please do something nice", "--mode", "web"])
        .assert()
        .code(5);
}

#[test]
#[serial]
fn ambiguous_url_exits_invalid_args() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs"))
        .args(["run", "open http://a.test and http://b.test", "--mode", "web"])
        .assert()
        .code(5);
}

#[test]
#[serial]
fn unknown_mode_exits_invalid_args() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs"))
        .args(["run", "open http://a.test", "--mode", "browser"])
        .assert()
        .code(5);
}

#[test]
#[serial]
fn shell_run_leaves_wellformed_report_and_status() {
    let tmp = tempfile::tempdir().unwrap();
    let runs = tmp.path().join("runs");

    obr(&runs)
        .env("OI_BRIDGE_COMMAND", "sh")
        .env("OI_BRIDGE_ARGS", "-c")
        .args(["run", "echo 'OBSERVATION: estado del sistema ok'", "--mode", "shell", "--json"])
        .assert()
        .code(0);

    // Exactly one run directory with the full layout.
    let run_dirs: Vec<_> = std::fs::read_dir(&runs)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir() && e.path().join("prompt.json").exists())
        .collect();
    assert_eq!(run_dirs.len(), 1);
    let run_dir = run_dirs[0].path();
    assert!(run_dir.join("report.json").exists());
    assert!(run_dir.join("oi_stdout.log").exists());
    assert!(run_dir.join("evidence").is_dir());
    assert!(run_dir.join(".oi_home/.cache").is_dir());

    // Canonical schema with the narrative hint and a bounded result.
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("report.json")).unwrap())
            .unwrap();
    assert_eq!(report["result"], "partial");
    assert!(report["observations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|o| o == "estado del sistema ok"));
    assert!(report["actions"].as_array().unwrap().is_empty());

    // No run stays running (P1).
    let status: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(runs.join("status.json")).unwrap()).unwrap();
    let entries = status["runs"].as_object().unwrap();
    assert_eq!(entries.len(), 1);
    for entry in entries.values() {
        assert_eq!(entry["status"], "completed");
    }
}

#[test]
#[serial]
fn failed_operator_agent_still_finalises_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let runs = tmp.path().join("runs");

    obr(&runs)
        .env("OI_BRIDGE_COMMAND", "definitely-not-a-binary")
        .args(["run", "mirar el estado", "--mode", "shell"])
        .assert()
        .code(0);

    let status: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(runs.join("status.json")).unwrap()).unwrap();
    for entry in status["runs"].as_object().unwrap().values() {
        assert_ne!(entry["status"], "running");
    }
}

#[test]
#[serial]
fn web_attach_to_missing_session_exits_bootstrap_and_finalises() {
    let tmp = tempfile::tempdir().unwrap();
    let runs = tmp.path().join("runs");

    obr(&runs)
        .args(["run", "open http://x.test", "--mode", "web", "--attach", "web-ghost"])
        .assert()
        .code(4);

    // Even a bootstrap failure leaves a failed report and a terminal
    // status entry, never a run stuck in `running`.
    let status: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(runs.join("status.json")).unwrap()).unwrap();
    let entries = status["runs"].as_object().unwrap();
    assert_eq!(entries.len(), 1);
    for (run_id, entry) in entries {
        assert_eq!(entry["status"], "failed");
        let report: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(runs.join(run_id).join("report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["result"], "failed");
        assert!(report["actions"].as_array().unwrap().is_empty());
    }
}

#[test]
#[serial]
fn status_with_empty_root_reports_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs"))
        .arg("status")
        .assert()
        .code(0)
        .stdout(predicates::str::contains("No runs"))
        .stdout(predicates::str::contains("No sessions"));
}

#[test]
#[serial]
fn logs_without_runs_exits_invalid_args() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs")).arg("logs").assert().code(5);
}

#[test]
#[serial]
fn web_release_without_sessions_exits_invalid_args() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs"))
        .args(["web-release", "--attach", "last"])
        .assert()
        .code(5);
}

#[test]
#[serial]
fn doctor_shell_mode_runs() {
    let tmp = tempfile::tempdir().unwrap();
    obr(&tmp.path().join("runs"))
        .args(["doctor", "--mode", "shell"])
        .assert()
        .code(0)
        .stdout(predicates::str::contains("operator agent binary"));
}
