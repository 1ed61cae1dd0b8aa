// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence file naming.
//!
//! Evidence is captured synchronously around interactions and must live
//! under `<run_dir>/evidence/`. Absence of required evidence is a hard
//! failure under `--verified`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Phase of a step an evidence file was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidencePhase {
    Before,
    After,
    Retry(u32),
    Window,
    Context,
}

impl std::fmt::Display for EvidencePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidencePhase::Before => f.write_str("before"),
            EvidencePhase::After => f.write_str("after"),
            EvidencePhase::Retry(k) => write!(f, "retry_{k}"),
            EvidencePhase::Window => f.write_str("window"),
            EvidencePhase::Context => f.write_str("context"),
        }
    }
}

/// A captured evidence file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub path: PathBuf,
    pub step_index: usize,
    pub phase: EvidencePhase,
}

impl Evidence {
    /// File name for a screenshot evidence file: `step_<N>_<phase>.png`.
    pub fn screenshot_name(step_index: usize, phase: EvidencePhase) -> String {
        format!("step_{step_index}_{phase}.png")
    }

    /// File name for a text evidence file (GUI window listings).
    pub fn text_name(step_index: usize, phase: EvidencePhase) -> String {
        format!("step_{step_index}_{phase}.txt")
    }

    /// Full path under the run's evidence directory.
    pub fn screenshot_path(evidence_dir: &Path, step_index: usize, phase: EvidencePhase) -> PathBuf {
        evidence_dir.join(Self::screenshot_name(step_index, phase))
    }
}

#[cfg(test)]
#[path = "evidence_tests.rs"]
mod tests;
