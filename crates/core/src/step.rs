// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed step primitives and per-step outcomes.
//!
//! A plan is a frozen ordered list of steps; components downstream of the
//! parser must never reorder it.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Window operation for GUI-mode steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "op", content = "arg")]
pub enum WindowOp {
    List,
    Active,
    Activate(String),
    Open(String),
}

crate::simple_display! {
    WindowOp {
        List => "window:list",
        Active => "window:active",
        Activate(..) => "window:activate",
        Open(..) => "window:open",
    }
}

/// The primitive a step performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum StepKind {
    OpenUrl { url: String },
    ClickText { text: SmolStr },
    ClickSelector { selector: SmolStr },
    Fill { selector: SmolStr, value: String },
    Select { selector: SmolStr, choice: String },
    WaitSelector { selector: SmolStr },
    WaitText { text: SmolStr },
    VerifyVisible { target: SmolStr },
    Window { op: WindowOp },
}

impl StepKind {
    /// Interactive steps require before/after evidence and append to
    /// `actions[]` on success.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            StepKind::OpenUrl { .. }
                | StepKind::ClickText { .. }
                | StepKind::ClickSelector { .. }
                | StepKind::Fill { .. }
                | StepKind::Select { .. }
                | StepKind::Window { .. }
        )
    }

    /// Verify steps attach their outcome as a finding on the preceding step.
    pub fn is_verify(&self) -> bool {
        matches!(self, StepKind::VerifyVisible { .. })
    }

    /// The target this step operates on, for findings and prechecks.
    pub fn target(&self) -> Option<&str> {
        match self {
            StepKind::OpenUrl { url } => Some(url),
            StepKind::ClickText { text } | StepKind::WaitText { text } => Some(text),
            StepKind::ClickSelector { selector }
            | StepKind::Fill { selector, .. }
            | StepKind::Select { selector, .. }
            | StepKind::WaitSelector { selector } => Some(selector),
            StepKind::VerifyVisible { target } => Some(target),
            StepKind::Window { .. } => None,
        }
    }

    /// The engine-internal action string recorded on success.
    ///
    /// Only interactive kinds have one; waits and verifies observe without
    /// acting.
    pub fn action_string(&self) -> Option<String> {
        match self {
            StepKind::OpenUrl { url } => Some(format!("cmd: playwright open {url}")),
            StepKind::ClickText { text } => Some(format!("cmd: playwright click text:{text}")),
            StepKind::ClickSelector { selector } => {
                Some(format!("cmd: playwright click selector:{selector}"))
            }
            StepKind::Fill { selector, value } => {
                Some(format!("cmd: playwright fill selector:{selector} value:{value}"))
            }
            StepKind::Select { selector, choice } => {
                Some(format!("cmd: playwright select selector:{selector} choice:{choice}"))
            }
            StepKind::Window { op } => Some(format!("cmd: playwright {op}")),
            StepKind::WaitSelector { .. }
            | StepKind::WaitText { .. }
            | StepKind::VerifyVisible { .. } => None,
        }
    }
}

crate::simple_display! {
    StepKind {
        OpenUrl { .. } => "open-url",
        ClickText { .. } => "click-text",
        ClickSelector { .. } => "click-selector",
        Fill { .. } => "fill",
        Select { .. } => "select",
        WaitSelector { .. } => "wait-selector",
        WaitText { .. } => "wait-text",
        VerifyVisible { .. } => "verify-visible",
        Window { .. } => "window",
    }
}

/// Where a step came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOrigin {
    /// Parsed from the task text.
    Task,
    /// Auto-inserted by the parser (e.g. demo-login).
    Auto,
    /// Injected from the learning store on resume.
    Learning,
}

crate::simple_display! {
    StepOrigin {
        Task => "task",
        Auto => "auto",
        Learning => "learning",
    }
}

/// A single step in a frozen plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default)]
    pub optional: bool,
    pub origin: StepOrigin,
}

/// A frozen ordered plan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }
}

/// Classified result of executing one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Timeout,
    TargetNotFound,
    Skipped,
    Stuck,
    StuckIframe,
    BlockedGuardrail,
}

impl StepStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepStatus::Ok)
    }
}

crate::simple_display! {
    StepStatus {
        Ok => "ok",
        Timeout => "timeout",
        TargetNotFound => "target_not_found",
        Skipped => "skipped",
        Stuck => "stuck",
        StuckIframe => "stuck_iframe",
        BlockedGuardrail => "blocked_guardrail",
    }
}

/// Record of a completed step attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_index: usize,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_after: Option<String>,
    /// Selector that finally worked (may differ from the planned target
    /// when a learned fallback was used).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_used: Option<String>,
    #[serde(default)]
    pub retries: u32,
    /// Whether this step is interactive (denormalized for classification).
    #[serde(default)]
    pub interactive: bool,
}

impl StepOutcome {
    pub fn ok(step_index: usize, interactive: bool) -> Self {
        Self {
            step_index,
            status: StepStatus::Ok,
            evidence_before: None,
            evidence_after: None,
            selector_used: None,
            retries: 0,
            interactive,
        }
    }

    pub fn failed(step_index: usize, status: StepStatus, interactive: bool) -> Self {
        Self {
            step_index,
            status,
            evidence_before: None,
            evidence_after: None,
            selector_used: None,
            retries: 0,
            interactive,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
