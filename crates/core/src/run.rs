// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run context: the per-run configuration and identity.
//!
//! A run is one invocation executing one plan in one mode. The context is
//! created at run start, persisted as `prompt.json`, and mutated only by
//! the engine.

use crate::id::{short, WebSessionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Unique identifier for a run.
///
/// Derived from the task text (slug) plus a timestamp, with a numeric
/// collision suffix appended by the storage layer when the directory
/// already exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Derive a run ID from the task text and a millisecond timestamp.
    ///
    /// The slug keeps the first 24 characters of the lowercased task with
    /// non-alphanumerics collapsed to single dashes.
    pub fn derive(task: &str, epoch_ms: u64) -> Self {
        let mut slug = String::new();
        let mut dash = true;
        for c in task.chars().flat_map(char::to_lowercase) {
            if c.is_ascii_alphanumeric() {
                slug.push(c);
                dash = false;
            } else if !dash {
                slug.push('-');
                dash = true;
            }
        }
        let slug = short(slug.trim_end_matches('-'), 24).trim_end_matches('-').to_string();
        if slug.is_empty() {
            Self(format!("run-{epoch_ms}"))
        } else {
            Self(format!("{slug}-{epoch_ms}"))
        }
    }

    /// Return a copy with a collision suffix (`-2`, `-3`, ...).
    pub fn with_collision_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Execution backend for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Shell,
    Gui,
    Web,
}

crate::simple_display! {
    Mode {
        Shell => "shell",
        Gui => "gui",
        Web => "web",
    }
}

/// Observer noise filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseMode {
    /// Manual mousemove/scroll and trivial clicks under user control do
    /// not count as useful progress.
    #[default]
    Minimal,
    /// Every observer event except mousemove counts as useful progress.
    Debug,
}

crate::simple_display! {
    NoiseMode {
        Minimal => "minimal",
        Debug => "debug",
    }
}

/// Behaviour flags for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFlags {
    /// Stricter evidence requirements: missing before/after is fatal.
    #[serde(default)]
    pub verified: bool,
    /// Cursor overlay and human-mouse trajectories.
    #[serde(default)]
    pub visual: bool,
    /// Enable retries with learned selectors and the handoff pipeline.
    #[serde(default)]
    pub teaching: bool,
    /// Require confirmation before sensitive actions.
    #[serde(default)]
    pub confirm_sensitive: bool,
    /// Leave the browser window open after the run.
    #[serde(default)]
    pub keep_open: bool,
}

/// Step and run deadlines, resolved from the environment at run start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
    pub interactive_ms: u64,
    pub step_hard_ms: u64,
    pub run_hard_ms: u64,
}

impl Deadlines {
    /// Resolve deadlines from the environment.
    pub fn from_env() -> Self {
        Self {
            interactive_ms: crate::env::interactive_timeout().as_millis() as u64,
            step_hard_ms: crate::env::step_hard_timeout().as_millis() as u64,
            run_hard_ms: crate::env::run_hard_timeout().as_millis() as u64,
        }
    }

    pub fn interactive(&self) -> Duration {
        Duration::from_millis(self.interactive_ms)
    }

    pub fn step_hard(&self) -> Duration {
        Duration::from_millis(self.step_hard_ms)
    }

    pub fn run_hard(&self) -> Duration {
        Duration::from_millis(self.run_hard_ms)
    }
}

/// Terminal status of a run in the global status index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

crate::simple_display! {
    RunStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Per-run context, persisted as `prompt.json` in the run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: RunId,
    pub run_dir: PathBuf,
    pub task: String,
    pub mode: Mode,
    #[serde(default)]
    pub flags: RunFlags,
    pub deadlines: Deadlines,
    #[serde(default)]
    pub noise_mode: NoiseMode,
    /// Session to attach to instead of opening a fresh browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_session_id: Option<WebSessionId>,
    pub created_at_ms: u64,
}

impl RunContext {
    /// Goal string used in the report (the task, verbatim).
    pub fn goal(&self) -> &str {
        &self.task
    }
}

crate::builder! {
    pub struct RunContextBuilder => RunContext {
        into {
            task: String = "open http://localhost:5173",
            run_dir: PathBuf = "/tmp/obr-test",
        }
        set {
            run_id: RunId = RunId::from("test-run-1"),
            mode: Mode = Mode::Web,
            flags: RunFlags = RunFlags::default(),
            deadlines: Deadlines = Deadlines { interactive_ms: 8_000, step_hard_ms: 20_000, run_hard_ms: 120_000 },
            noise_mode: NoiseMode = NoiseMode::Minimal,
            created_at_ms: u64 = 1_000_000,
        }
        option {
            attach_session_id: WebSessionId = None,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
