// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run directory layout and the runs root.
//!
//! Everything a run produces lives under `runs/<run_id>/`; everything the
//! report references must resolve inside that directory.

use crate::StorageError;
use obr_core::RunId;
use std::fs;
use std::path::{Path, PathBuf};

/// Root of all persisted bridge state (`runs/` by default).
#[derive(Debug, Clone)]
pub struct RunsRoot(PathBuf);

impl RunsRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Default location: `runs/` under the current working directory.
    pub fn default_location() -> Self {
        Self(PathBuf::from("runs"))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.0.join("web_sessions")
    }

    pub fn learning_file(&self) -> PathBuf {
        self.0.join("learning").join("web_teaching_selectors.json")
    }

    pub fn status_file(&self) -> PathBuf {
        self.0.join("status.json")
    }

    /// Allocate a run directory, appending a collision suffix (`-2`,
    /// `-3`, …) until the directory is fresh. Creates the evidence,
    /// learning, and scoped-home subtrees.
    pub fn allocate_run(&self, base: &RunId) -> Result<RunPaths, StorageError> {
        let mut id = base.clone();
        let mut n = 1u32;
        loop {
            let dir = self.0.join(id.as_str());
            if !dir.exists() {
                let paths = RunPaths::new(id, dir);
                paths.create_dirs()?;
                return Ok(paths);
            }
            n += 1;
            id = base.with_collision_suffix(n);
        }
    }

    /// Paths for an existing run (no directories created).
    pub fn run(&self, id: &RunId) -> RunPaths {
        RunPaths::new(id.clone(), self.0.join(id.as_str()))
    }
}

/// All well-known files and directories of one run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub run_id: RunId,
    pub run_dir: PathBuf,
}

impl RunPaths {
    fn new(run_id: RunId, run_dir: PathBuf) -> Self {
        Self { run_id, run_dir }
    }

    pub fn prompt(&self) -> PathBuf {
        self.run_dir.join("prompt.json")
    }

    pub fn bridge_log(&self) -> PathBuf {
        self.run_dir.join("bridge.log")
    }

    pub fn oi_stdout(&self) -> PathBuf {
        self.run_dir.join("oi_stdout.log")
    }

    pub fn oi_stderr(&self) -> PathBuf {
        self.run_dir.join("oi_stderr.log")
    }

    pub fn report(&self) -> PathBuf {
        self.run_dir.join("report.json")
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.run_dir.join("evidence")
    }

    pub fn learning_dir(&self) -> PathBuf {
        self.run_dir.join("learning")
    }

    /// Per-run teaching artifact path (`learning/teaching_<N>.json`).
    pub fn teaching_file(&self, n: u32) -> PathBuf {
        self.learning_dir().join(format!("teaching_{n}.json"))
    }

    /// Scoped writable home for the operator-agent subprocess.
    pub fn oi_home(&self) -> PathBuf {
        self.run_dir.join(".oi_home")
    }

    pub fn create_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.evidence_dir())?;
        fs::create_dir_all(self.learning_dir())?;
        fs::create_dir_all(self.oi_home().join(".cache"))?;
        fs::create_dir_all(self.oi_home().join(".config"))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
