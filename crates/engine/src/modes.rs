// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell and GUI modes at the shared contract.
//!
//! These modes delegate the narrative work to the operator-agent
//! subprocess and execute only the plan's window primitives themselves.
//! Every composed command passes the guardrails; the narrative output
//! contributes observation and finding hints, never actions or evidence.

use obr_adapters::oi::{NarrativeExecutor, OiConfig};
use obr_core::evidence::Evidence;
use obr_core::{
    Finding, FindingKind, Plan, ReportDraft, RunContext, Severity, Step, StepKind, StepOutcome,
    StepStatus, WindowOp,
};
use obr_storage::RunPaths;
use std::process::Stdio;
use std::time::Duration;

/// Per-command budget for window primitives.
const WINDOW_CMD_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a shell/gui-mode plan: window steps are executed directly, the
/// rest of the task goes to the narrative executor.
pub async fn run_narrative_mode(
    ctx: &RunContext,
    paths: &RunPaths,
    plan: &Plan,
) -> (ReportDraft, Vec<Finding>) {
    let mut draft = ReportDraft::new(ctx.run_id.as_str(), ctx.goal());
    let mut findings = Vec::new();

    for step in plan.iter() {
        if let StepKind::Window { op } = &step.kind {
            execute_window_step(ctx, paths, step, op, &mut draft, &mut findings).await;
        } else {
            // Non-window primitives in these modes are the narrative
            // executor's job; they carry no engine-authored action.
            draft.push_outcome(StepOutcome::failed(step.index, StepStatus::Skipped, false));
        }
    }

    let config = OiConfig::from_env(
        &ctx.task,
        paths.oi_home(),
        paths.oi_stdout(),
        paths.oi_stderr(),
    );
    match NarrativeExecutor::run(&config).await {
        Ok(hints) => {
            for obs in hints.observations {
                draft.push_observation(obs);
            }
            for finding in hints.ui_findings {
                draft.push_ui_finding(finding);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "narrative executor unavailable");
            findings.push(
                Finding::new(FindingKind::Observation, 0, format!("operator agent: {e}"))
                    .severity(Severity::Warn),
            );
        }
    }

    (draft, findings)
}

/// Compose, guard, and execute one window primitive, writing its output
/// as `step_<N>_window.txt` evidence.
async fn execute_window_step(
    ctx: &RunContext,
    paths: &RunPaths,
    step: &Step,
    op: &WindowOp,
    draft: &mut ReportDraft,
    findings: &mut Vec<Finding>,
) {
    let command = match op {
        WindowOp::List => "wmctrl -l".to_string(),
        WindowOp::Active => "xdotool getactivewindow getwindowname".to_string(),
        WindowOp::Activate(name) => format!("wmctrl -a {name}"),
        WindowOp::Open(name) => format!("xdotool search --name {name} windowactivate"),
    };
    let action = format!("cmd: {command}");

    if let Err(violation) = obr_guard::check_action(ctx.mode, &ctx.flags, &action) {
        findings.push(
            Finding::new(
                FindingKind::Ui,
                step.index,
                format!("guardrail {}: {violation}", violation.rule()),
            )
            .severity(Severity::Error),
        );
        draft.push_outcome(StepOutcome::failed(step.index, StepStatus::BlockedGuardrail, true));
        return;
    }

    match run_window_command(&command).await {
        Ok(output) => {
            let evidence = paths
                .evidence_dir()
                .join(Evidence::text_name(step.index, obr_core::EvidencePhase::Window));
            if std::fs::write(&evidence, &output).is_ok() {
                draft.push_evidence(evidence.display().to_string());
            }
            let mut outcome = StepOutcome::ok(step.index, true);
            outcome.evidence_after = Some(evidence.display().to_string());
            draft.push_action(action);
            draft.push_outcome(outcome);
        }
        Err(e) => {
            findings.push(
                Finding::new(FindingKind::Ui, step.index, format!("window op failed: {e}"))
                    .attempted(command),
            );
            draft.push_outcome(StepOutcome::failed(step.index, StepStatus::Timeout, true));
        }
    }
}

async fn run_window_command(command: &str) -> Result<String, String> {
    let mut parts = command.split_whitespace();
    let Some(binary) = parts.next() else {
        return Err("empty command".to_string());
    };
    let run = tokio::process::Command::new(binary)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(WINDOW_CMD_TIMEOUT, run)
        .await
        .map_err(|_| "window command timed out".to_string())?
        .map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(format!("exit {}", output.status.code().unwrap_or(-1)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
#[path = "modes_tests.rs"]
mod tests;
