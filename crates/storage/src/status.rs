// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global status index: `runs/status.json`.
//!
//! Every run transitions `running → completed|failed` exactly once. The
//! index is updated as the final side effect of finalisation, so a
//! crash before the transition leaves the run visibly `running` for the
//! doctor to flag, never a half-written report marked complete.

use crate::atomic::{atomic_write_json, read_json, with_file_lock};
use crate::StorageError;
use obr_core::{Mode, RunId, RunResult, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One run's entry in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    pub mode: Mode,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    runs: BTreeMap<String, StatusEntry>,
}

/// Handle to the status index.
#[derive(Debug, Clone)]
pub struct StatusIndex {
    path: PathBuf,
}

impl StatusIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn get(&self, run_id: &RunId) -> Result<Option<StatusEntry>, StorageError> {
        let index: IndexFile = read_json(&self.path)?.unwrap_or_default();
        Ok(index.runs.get(run_id.as_str()).cloned())
    }

    pub fn all(&self) -> Result<Vec<(RunId, StatusEntry)>, StorageError> {
        let index: IndexFile = read_json(&self.path)?.unwrap_or_default();
        Ok(index
            .runs
            .into_iter()
            .map(|(id, entry)| (RunId::from_string(id), entry))
            .collect())
    }

    /// Mark a run as running. Called once at run start.
    pub fn set_running(&self, run_id: &RunId, mode: Mode, epoch_ms: u64) -> Result<(), StorageError> {
        self.mutate(|index| {
            index.runs.insert(
                run_id.as_str().to_string(),
                StatusEntry { status: RunStatus::Running, result: None, mode, updated_at_ms: epoch_ms },
            );
            Ok(())
        })
    }

    /// Transition a run to its terminal status. Errors if the run is
    /// already terminal; the transition happens exactly once.
    pub fn finalize(
        &self,
        run_id: &RunId,
        result: RunResult,
        epoch_ms: u64,
    ) -> Result<(), StorageError> {
        self.mutate(|index| {
            let entry = index.runs.get_mut(run_id.as_str());
            match entry {
                Some(entry) if entry.status == RunStatus::Running => {
                    entry.status = match result {
                        RunResult::Failed => RunStatus::Failed,
                        RunResult::Success | RunResult::Partial => RunStatus::Completed,
                    };
                    entry.result = Some(result);
                    entry.updated_at_ms = epoch_ms;
                    Ok(())
                }
                Some(_) => Err(StorageError::AlreadyFinalised(run_id.as_str().to_string())),
                None => Err(StorageError::SessionNotFound(run_id.as_str().to_string())),
            }
        })
    }

    /// Runs still marked running (crash leftovers surfaced by `doctor`).
    pub fn stuck_running(&self) -> Result<Vec<RunId>, StorageError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|(_, e)| e.status == RunStatus::Running)
            .map(|(id, _)| id)
            .collect())
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut IndexFile) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        with_file_lock(&self.path, || {
            let mut index: IndexFile = read_json(&self.path)?.unwrap_or_default();
            f(&mut index)?;
            atomic_write_json(&self.path, &index)
        })
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
