// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_core::{Mode, RunId, RunResult, RunStatus};

fn index() -> (tempfile::TempDir, StatusIndex) {
    let dir = tempfile::tempdir().unwrap();
    let index = StatusIndex::new(dir.path().join("status.json"));
    (dir, index)
}

#[test]
fn running_then_completed_exactly_once() {
    let (_dir, index) = index();
    let id = RunId::from("open-app-1");

    index.set_running(&id, Mode::Web, 1_000).unwrap();
    assert_eq!(index.get(&id).unwrap().unwrap().status, RunStatus::Running);

    index.finalize(&id, RunResult::Partial, 2_000).unwrap();
    let entry = index.get(&id).unwrap().unwrap();
    assert_eq!(entry.status, RunStatus::Completed);
    assert_eq!(entry.result, Some(RunResult::Partial));
    assert_eq!(entry.updated_at_ms, 2_000);

    // Second finalisation is refused.
    let err = index.finalize(&id, RunResult::Success, 3_000).unwrap_err();
    assert!(matches!(err, StorageError::AlreadyFinalised(_)));
}

#[test]
fn failed_result_maps_to_failed_status() {
    let (_dir, index) = index();
    let id = RunId::from("r-2");
    index.set_running(&id, Mode::Shell, 1_000).unwrap();
    index.finalize(&id, RunResult::Failed, 2_000).unwrap();
    assert_eq!(index.get(&id).unwrap().unwrap().status, RunStatus::Failed);
}

#[test]
fn finalize_unknown_run_errors() {
    let (_dir, index) = index();
    let err = index.finalize(&RunId::from("ghost"), RunResult::Failed, 1_000).unwrap_err();
    assert!(matches!(err, StorageError::SessionNotFound(_)));
}

#[test]
fn stuck_running_lists_only_running() {
    let (_dir, index) = index();
    index.set_running(&RunId::from("a"), Mode::Web, 1_000).unwrap();
    index.set_running(&RunId::from("b"), Mode::Web, 1_000).unwrap();
    index.finalize(&RunId::from("a"), RunResult::Success, 2_000).unwrap();

    let stuck = index.stuck_running().unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].as_str(), "b");
}
