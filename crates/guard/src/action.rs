// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action-string policies: shape, code-edit intent, destructive verbs,
//! per-mode allowlists, and GUI click rules.

use obr_core::{Mode, RunFlags, ACTION_PREFIX};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// A policy rejection. Fatal for the proposing step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("malformed action (must be `cmd: …`): {0}")]
    MalformedAction(String),
    #[error("code-edit intent rejected: {0}")]
    CodeEdit(String),
    #[error("destructive command rejected: {0}")]
    Destructive(String),
    #[error("command not allowlisted for {mode} mode: {action}")]
    NotAllowlisted { mode: Mode, action: String },
    #[error("coordinate click rejected: {0}")]
    CoordinateClick(String),
    #[error("click without explicit target window: {0}")]
    MissingTargetWindow(String),
    #[error("sensitive action requires --confirm-sensitive: {0}")]
    NeedsConfirmation(String),
    #[error("evidence path escapes the run directory: {0}")]
    EvidenceEscape(String),
}

impl GuardViolation {
    /// Stable rule name recorded in findings.
    pub fn rule(&self) -> &'static str {
        match self {
            GuardViolation::MalformedAction(_) => "malformed_action",
            GuardViolation::CodeEdit(_) => "code_edit",
            GuardViolation::Destructive(_) => "destructive",
            GuardViolation::NotAllowlisted { .. } => "not_allowlisted",
            GuardViolation::CoordinateClick(_) => "coordinate_click",
            GuardViolation::MissingTargetWindow(_) => "missing_target_window",
            GuardViolation::NeedsConfirmation(_) => "needs_confirmation",
            GuardViolation::EvidenceEscape(_) => "evidence_path",
        }
    }
}

/// Editor invocations and write-to-source shapes. The bridge never edits
/// code, in any mode.
const CODE_EDIT_MARKERS: &[&str] = &[
    "vim ", "vi ", "nvim ", "nano ", "emacs ", "code ", "sed -i", "tee ",
    "git commit", "git apply", "patch ",
];

const CODE_EDIT_REDIRECT_SUFFIXES: &[&str] = &[".rs", ".py", ".js", ".ts", ".go", ".c", ".h", ".java"];

/// Destructive shell verbs. Matched as substrings of the command text.
const DESTRUCTIVE_MARKERS: &[&str] = &[
    "rm -rf", "rm -fr", "mkfs", "dd if=", "dd of=", "shutdown", "reboot", "halt",
    ":(){:|:&};:", "kill -9 -1", "chmod -r 000", "> /dev/sd",
];

/// Observation-only binaries permitted in shell mode.
const SHELL_ALLOWLIST: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "find", "wc", "stat", "file", "ps", "top",
    "df", "du", "free", "uname", "uptime", "whoami", "id", "date", "env", "pwd",
    "echo", "which", "hostname",
];

/// GUI mode adds the X11 observation/interaction toolbox.
const GUI_ALLOWLIST: &[&str] = &["xdotool", "wmctrl", "xwininfo", "import", "scrot", "xprop"];

/// GUI actions that inject input and therefore need explicit confirmation.
const SENSITIVE_MARKERS: &[&str] = &["xdotool type", "xdotool key"];

fn coordinate_click_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"mousemove\s+\d+\s+\d+.*\bclick\b").expect("static pattern")
    })
}

/// Check a candidate action string against every policy for the mode.
///
/// The string must already carry the `cmd: ` prefix; the command text is
/// everything after it.
pub fn check_action(mode: Mode, flags: &RunFlags, action: &str) -> Result<(), GuardViolation> {
    let Some(command) = action.strip_prefix(ACTION_PREFIX).filter(|c| !c.trim().is_empty())
    else {
        return Err(GuardViolation::MalformedAction(action.to_string()));
    };
    let command = command.trim();
    let lower = command.to_lowercase();

    for marker in CODE_EDIT_MARKERS {
        if lower.starts_with(marker.trim_end()) || lower.contains(&format!("| {marker}")) || lower.contains(&format!("&& {marker}")) {
            return Err(GuardViolation::CodeEdit(command.to_string()));
        }
    }
    if let Some(redirect) = lower.split('>').nth(1) {
        let target = redirect.trim().trim_start_matches('>').trim();
        if CODE_EDIT_REDIRECT_SUFFIXES.iter().any(|s| target.ends_with(s)) {
            return Err(GuardViolation::CodeEdit(command.to_string()));
        }
    }

    for marker in DESTRUCTIVE_MARKERS {
        if lower.contains(marker) {
            return Err(GuardViolation::Destructive(command.to_string()));
        }
    }

    let head = command.split_whitespace().next().unwrap_or_default();
    match mode {
        Mode::Web => {
            if head != "playwright" {
                return Err(GuardViolation::NotAllowlisted { mode, action: command.to_string() });
            }
        }
        Mode::Shell => {
            if !SHELL_ALLOWLIST.contains(&head) {
                return Err(GuardViolation::NotAllowlisted { mode, action: command.to_string() });
            }
        }
        Mode::Gui => {
            if !SHELL_ALLOWLIST.contains(&head) && !GUI_ALLOWLIST.contains(&head) {
                return Err(GuardViolation::NotAllowlisted { mode, action: command.to_string() });
            }
            if coordinate_click_re().is_match(&lower) {
                return Err(GuardViolation::CoordinateClick(command.to_string()));
            }
            if head == "xdotool" && lower.contains("click") && !lower.contains("--window") {
                return Err(GuardViolation::MissingTargetWindow(command.to_string()));
            }
            if !flags.confirm_sensitive
                && SENSITIVE_MARKERS.iter().any(|marker| lower.starts_with(marker))
            {
                return Err(GuardViolation::NeedsConfirmation(command.to_string()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
