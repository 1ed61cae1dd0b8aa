// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run finalisation: the one path every run exits through.
//!
//! No exception escapes here. Any late failure becomes a fatal finding
//! plus `result=failed`, the report is still written atomically, and the
//! status index transition is the last side effect.

use obr_core::{
    classify_result, Finding, FindingKind, Report, ReportDraft, RunContext, RunResult, Severity,
};
use obr_storage::{atomic_write_json, RunPaths, StatusIndex};
use std::path::Path;

/// Everything the finaliser consumes.
pub struct FinalizeInput {
    pub ctx: RunContext,
    pub paths: RunPaths,
    pub draft: ReportDraft,
    pub findings: Vec<Finding>,
    pub verify_ok: bool,
    pub run_timed_out: bool,
    pub handoff_pending: bool,
}

/// Finalise a run: enforce the report invariants, classify, write the
/// report, then flip the status index.
pub fn finalize_run(mut input: FinalizeInput, status: &StatusIndex, epoch_ms: u64) -> Report {
    let mut verify_ok = input.verify_ok;

    if input.run_timed_out {
        input
            .findings
            .push(Finding::new(FindingKind::Ui, 0, "run_timeout").severity(Severity::Error));
    }
    if input.handoff_pending {
        input.findings.push(
            Finding::new(FindingKind::Ui, 0, "learning window expired; session left to user")
                .severity(Severity::Warn),
        );
    }

    // Verified mode: every ok interactive step needs both evidence shots
    // on disk, non-empty.
    if input.ctx.flags.verified {
        for outcome in input.draft.outcomes.iter() {
            if !(outcome.interactive && outcome.status.is_ok()) {
                continue;
            }
            let before_ok = evidence_file_ok(outcome.evidence_before.as_deref());
            let after_ok = evidence_file_ok(outcome.evidence_after.as_deref());
            if !(before_ok && after_ok) {
                verify_ok = false;
                input.findings.push(
                    Finding::new(
                        FindingKind::Ui,
                        outcome.step_index,
                        "missing required before/after evidence",
                    )
                    .severity(Severity::Error),
                );
            }
        }
    }

    // Render structured findings into the flat report array, preserving
    // append order and skipping duplicates.
    for finding in &input.findings {
        let rendered = finding.render();
        if !input.draft.ui_findings.iter().any(|f| f == &rendered) {
            input.draft.ui_findings.push(rendered);
        }
    }

    // Sweep the evidence directory for files the draft's bookkeeping
    // missed (retry shots around a crash, window listings).
    let pattern = input.paths.evidence_dir().join("step_*");
    if let Some(pattern) = pattern.to_str() {
        if let Ok(entries) = glob::glob(pattern) {
            for path in entries.flatten() {
                let s = path.display().to_string();
                if !input.draft.evidence_paths.iter().any(|p| p == &s) {
                    input.draft.evidence_paths.push(s);
                }
            }
        }
    }

    // Every referenced path must resolve inside the run directory.
    let run_dir = input.paths.run_dir.clone();
    let mut kept = Vec::with_capacity(input.draft.evidence_paths.len());
    for path in std::mem::take(&mut input.draft.evidence_paths) {
        if obr_guard::evidence_path_ok(&run_dir, &path) {
            kept.push(path);
        } else {
            input.draft.ui_findings.push(format!("guardrail: evidence path rejected: {path}"));
        }
    }
    input.draft.evidence_paths = kept;

    // Action shape; the engine never produces violations, but the
    // report must hold regardless.
    input.draft.actions.retain(|a| Report::action_is_valid(a));

    // A timed-out step appended nothing, so these counts must agree.
    if input.draft.actions.len() != input.draft.ok_interactive() {
        tracing::error!(
            actions = input.draft.actions.len(),
            ok = input.draft.ok_interactive(),
            "action/outcome count mismatch"
        );
        input.draft.ui_findings.push("internal: action count mismatch".to_string());
    }

    let mut result = if input.run_timed_out {
        if input.draft.ok_interactive() > 0 {
            RunResult::Partial
        } else {
            RunResult::Failed
        }
    } else {
        classify_result(&input.draft.outcomes, verify_ok)
    };

    // Narrative-only runs (shell mode without window primitives) have no
    // interactive outcomes to classify; observations from the operator
    // agent bound the claim at partial.
    if result == RunResult::Failed
        && !input.draft.observations.is_empty()
        && input.draft.outcomes.iter().all(|o| !o.interactive)
    {
        result = RunResult::Partial;
    }

    // Project the assembled report through the shared normaliser so the
    // written artifact is canonical regardless of which backend filled
    // the draft: arrays deduplicated, shapes enforced, idempotent.
    let assembled = input.draft.into_report(result);
    let report = match serde_json::to_value(&assembled) {
        Ok(value) => Report::normalise(&value, &|p| obr_guard::evidence_path_ok(&run_dir, p)),
        Err(_) => assembled,
    };

    if let Err(e) = atomic_write_json(&input.paths.report(), &report) {
        tracing::error!(error = %e, "report write failed");
    }
    // Status index update is the final side effect.
    if let Err(e) = status.finalize(&input.ctx.run_id, result, epoch_ms) {
        tracing::error!(error = %e, "status index finalisation failed");
    }

    tracing::info!(run_id = %input.ctx.run_id, %result, "run finalised");
    report
}

fn evidence_file_ok(path: Option<&str>) -> bool {
    let Some(path) = path else {
        return false;
    };
    std::fs::metadata(Path::new(path)).map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
#[path = "finalize_tests.rs"]
mod tests;
