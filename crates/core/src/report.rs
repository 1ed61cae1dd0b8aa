// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical report schema and the normaliser.
//!
//! Every backend, however messy its output, is projected onto this one
//! schema. The normaliser is total over arbitrary JSON: unknown fields are
//! dropped, the result enum is coerced, arrays are deduplicated in order,
//! malformed actions and out-of-tree evidence paths are rejected with a
//! guardrail finding. Normalisation is idempotent.

use crate::step::{StepOutcome, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every accepted action string starts with this prefix.
pub const ACTION_PREFIX: &str = "cmd: ";

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Success,
    Partial,
    Failed,
}

crate::simple_display! {
    RunResult {
        Success => "success",
        Partial => "partial",
        Failed => "failed",
    }
}

/// The canonical machine-readable report, written once at finalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub task_id: String,
    pub goal: String,
    pub actions: Vec<String>,
    pub observations: Vec<String>,
    pub console_errors: Vec<String>,
    pub network_findings: Vec<String>,
    pub ui_findings: Vec<String>,
    pub result: RunResult,
    pub evidence_paths: Vec<String>,
}

impl Report {
    /// Whether a candidate action string has the required shape.
    pub fn action_is_valid(action: &str) -> bool {
        action.strip_prefix(ACTION_PREFIX).is_some_and(|rest| !rest.is_empty())
    }

    /// Project arbitrary backend output onto the canonical schema.
    ///
    /// `path_ok` decides whether an evidence path is allowed (canonical
    /// containment in the run dir; policy lives in the guard crate).
    /// Rejections surface as guardrail entries in `ui_findings`.
    pub fn normalise(value: &Value, path_ok: &dyn Fn(&str) -> bool) -> Report {
        let obj = value.as_object();
        let str_field = |key: &str| -> String {
            obj.and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let str_array = |key: &str| -> Vec<String> {
            let mut out: Vec<String> = Vec::new();
            if let Some(items) = obj.and_then(|o| o.get(key)).and_then(Value::as_array) {
                for item in items {
                    if let Some(s) = item.as_str() {
                        if !s.is_empty() && !out.iter().any(|e| e == s) {
                            out.push(s.to_string());
                        }
                    }
                }
            }
            out
        };

        let mut ui_findings = str_array("ui_findings");

        let mut actions = Vec::new();
        for a in str_array("actions") {
            if Report::action_is_valid(&a) {
                actions.push(a);
            } else {
                let entry = format!("guardrail: malformed action dropped: {a}");
                if !ui_findings.iter().any(|e| e == &entry) {
                    ui_findings.push(entry);
                }
            }
        }

        let mut evidence_paths = Vec::new();
        for p in str_array("evidence_paths") {
            if path_ok(&p) {
                evidence_paths.push(p);
            } else {
                let entry = format!("guardrail: evidence path rejected: {p}");
                if !ui_findings.iter().any(|e| e == &entry) {
                    ui_findings.push(entry);
                }
            }
        }

        let result = match str_field("result").as_str() {
            "success" => RunResult::Success,
            "partial" => RunResult::Partial,
            _ => RunResult::Failed,
        };

        Report {
            task_id: str_field("task_id"),
            goal: str_field("goal"),
            actions,
            observations: str_array("observations"),
            console_errors: str_array("console_errors"),
            network_findings: str_array("network_findings"),
            ui_findings,
            result,
            evidence_paths,
        }
    }
}

/// Classify the run result as a pure function of step outcomes.
///
/// `verify_ok` is false when any verify finding was negative.
/// The run-timeout override (partial when the hard deadline cut a run with
/// at least one ok) is applied by the finaliser before calling this.
pub fn classify_result(outcomes: &[StepOutcome], verify_ok: bool) -> RunResult {
    let interactive: Vec<&StepOutcome> = outcomes.iter().filter(|o| o.interactive).collect();
    let ok = interactive.iter().filter(|o| o.status.is_ok()).count();
    let failed = interactive
        .iter()
        .filter(|o| !o.status.is_ok() && o.status != StepStatus::Skipped)
        .count();

    if ok == 0 {
        return RunResult::Failed;
    }
    if failed == 0 && verify_ok {
        RunResult::Success
    } else {
        RunResult::Partial
    }
}

/// Mutable accumulator the engine writes into while a run executes.
///
/// `actions` and `evidence_paths` are authored exclusively by the engine;
/// narrative backend text only ever contributes observation and finding
/// hints (it is a lossy channel and is never trusted for the rest).
#[derive(Debug, Default, Clone)]
pub struct ReportDraft {
    pub task_id: String,
    pub goal: String,
    pub actions: Vec<String>,
    pub observations: Vec<String>,
    pub console_errors: Vec<String>,
    pub network_findings: Vec<String>,
    pub ui_findings: Vec<String>,
    pub evidence_paths: Vec<String>,
    pub outcomes: Vec<StepOutcome>,
}

impl ReportDraft {
    pub fn new(task_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Append an action string. Only the engine calls this, and only for
    /// interactive steps whose outcome is ok.
    pub fn push_action(&mut self, action: String) {
        debug_assert!(Report::action_is_valid(&action));
        self.actions.push(action);
    }

    pub fn push_observation(&mut self, obs: impl Into<String>) {
        self.observations.push(obs.into());
    }

    pub fn push_console_error(&mut self, err: impl Into<String>) {
        self.console_errors.push(err.into());
    }

    pub fn push_network_finding(&mut self, finding: impl Into<String>) {
        self.network_findings.push(finding.into());
    }

    pub fn push_ui_finding(&mut self, finding: impl Into<String>) {
        self.ui_findings.push(finding.into());
    }

    pub fn push_evidence(&mut self, path: impl Into<String>) {
        self.evidence_paths.push(path.into());
    }

    pub fn push_outcome(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    /// Count of ok interactive outcomes (must equal `actions.len()`).
    pub fn ok_interactive(&self) -> usize {
        self.outcomes.iter().filter(|o| o.interactive && o.status.is_ok()).count()
    }

    /// Assemble the final report with the given result.
    pub fn into_report(self, result: RunResult) -> Report {
        Report {
            task_id: self.task_id,
            goal: self.goal,
            actions: self.actions,
            observations: self.observations,
            console_errors: self.console_errors,
            network_findings: self.network_findings,
            ui_findings: self.ui_findings,
            result,
            evidence_paths: self.evidence_paths,
        }
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
