// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured observations tied to steps.
//!
//! Findings are appended during a step or by observers and never edited.

use serde::{Deserialize, Serialize};

/// Which channel a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Ui,
    Console,
    Network,
    Observation,
}

crate::simple_display! {
    FindingKind {
        Ui => "ui",
        Console => "console",
        Network => "network",
        Observation => "observation",
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warn,
    Error,
    Fatal,
}

crate::simple_display! {
    Severity {
        Info => "info",
        Warn => "warn",
        Error => "error",
        Fatal => "fatal",
    }
}

/// A structured observation tied to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Step index this finding belongs to.
    #[serde(rename = "where")]
    pub where_step: usize,
    pub what_failed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_best_action: Option<String>,
    #[serde(default)]
    pub severity: Severity,
}

impl Finding {
    pub fn new(kind: FindingKind, where_step: usize, what_failed: impl Into<String>) -> Self {
        Self {
            kind,
            where_step,
            what_failed: what_failed.into(),
            attempted: None,
            next_best_action: None,
            severity: Severity::default(),
        }
    }

    pub fn attempted(mut self, attempted: impl Into<String>) -> Self {
        self.attempted = Some(attempted.into());
        self
    }

    pub fn next_best_action(mut self, next: impl Into<String>) -> Self {
        self.next_best_action = Some(next.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Render for the flat string arrays in the report.
    ///
    /// Format: `step <N>: <what_failed> [attempted: …] [next: …]`
    pub fn render(&self) -> String {
        let mut out = format!("step {}: {}", self.where_step, self.what_failed);
        if let Some(a) = &self.attempted {
            out.push_str(&format!(" [attempted: {a}]"));
        }
        if let Some(n) = &self.next_best_action {
            out.push_str(&format!(" [next: {n}]"));
        }
        out
    }
}

#[cfg(test)]
#[path = "finding_tests.rs"]
mod tests;
