// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_core::{
    Mode, ReportDraft, RunContext, RunFlags, RunId, RunResult, RunStatus, StepOutcome, StepStatus,
};
use obr_storage::{RunsRoot, StatusIndex};

struct Fixture {
    _tmp: tempfile::TempDir,
    ctx: RunContext,
    paths: obr_storage::RunPaths,
    status: StatusIndex,
}

fn fixture(flags: RunFlags) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = RunsRoot::new(tmp.path().join("runs"));
    let paths = root.allocate_run(&RunId::from("final-run-1")).unwrap();
    let status = StatusIndex::new(root.status_file());
    let ctx = RunContext::builder()
        .run_dir(paths.run_dir.clone())
        .run_id(RunId::from("final-run-1"))
        .flags(flags)
        .build();
    status.set_running(&ctx.run_id, Mode::Web, 1_000).unwrap();
    Fixture { _tmp: tmp, ctx, paths, status }
}

fn input(f: &Fixture, draft: ReportDraft) -> FinalizeInput {
    FinalizeInput {
        ctx: f.ctx.clone(),
        paths: f.paths.clone(),
        draft,
        findings: Vec::new(),
        verify_ok: true,
        run_timed_out: false,
        handoff_pending: false,
    }
}

#[test]
fn evidence_traversal_is_dropped_with_guardrail_finding() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_outcome(StepOutcome::ok(0, true));
    draft.push_action("cmd: playwright open http://x".to_string());
    draft.push_evidence("../../etc/passwd");

    let report = finalize_run(input(&f, draft), &f.status, 2_000);

    assert!(report.evidence_paths.is_empty());
    assert!(report
        .ui_findings
        .iter()
        .any(|e| e == "guardrail: evidence path rejected: ../../etc/passwd"));
    assert_eq!(report.result, RunResult::Success);
}

#[test]
fn report_written_and_status_flipped_exactly_once() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_outcome(StepOutcome::ok(0, true));
    draft.push_action("cmd: playwright open http://x".to_string());

    let report = finalize_run(input(&f, draft), &f.status, 2_000);
    assert_eq!(report.result, RunResult::Success);

    let on_disk: obr_core::Report =
        serde_json::from_str(&std::fs::read_to_string(f.paths.report()).unwrap()).unwrap();
    assert_eq!(on_disk, report);

    let entry = f.status.get(&f.ctx.run_id).unwrap().unwrap();
    assert_eq!(entry.status, RunStatus::Completed);
    assert_eq!(entry.result, Some(RunResult::Success));
    // Second finalisation refuses: the transition happens exactly once.
    assert!(f.status.finalize(&f.ctx.run_id, RunResult::Failed, 3_000).is_err());
}

#[test]
fn mixed_outcomes_classify_partial() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_outcome(StepOutcome::ok(0, true));
    draft.push_action("cmd: playwright open http://x".to_string());
    draft.push_outcome(StepOutcome::failed(1, StepStatus::Timeout, true));

    let report = finalize_run(input(&f, draft), &f.status, 2_000);
    assert_eq!(report.result, RunResult::Partial);
}

#[test]
fn zero_ok_interactive_is_failed() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_outcome(StepOutcome::failed(0, StepStatus::TargetNotFound, true));

    let report = finalize_run(input(&f, draft), &f.status, 2_000);
    assert_eq!(report.result, RunResult::Failed);
}

#[test]
fn run_timeout_with_progress_is_partial() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_outcome(StepOutcome::ok(0, true));
    draft.push_action("cmd: playwright open http://x".to_string());

    let mut input = input(&f, draft);
    input.run_timed_out = true;
    let report = finalize_run(input, &f.status, 2_000);

    assert_eq!(report.result, RunResult::Partial);
    assert!(report.ui_findings.iter().any(|e| e.contains("run_timeout")));
}

#[test]
fn verified_mode_flags_missing_evidence() {
    let f = fixture(RunFlags { verified: true, ..RunFlags::default() });
    let mut draft = ReportDraft::new("t", "goal");
    // Ok outcome that claims no evidence files at all.
    draft.push_outcome(StepOutcome::ok(0, true));
    draft.push_action("cmd: playwright open http://x".to_string());

    let report = finalize_run(input(&f, draft), &f.status, 2_000);

    assert_eq!(report.result, RunResult::Partial);
    assert!(report
        .ui_findings
        .iter()
        .any(|e| e.contains("missing required before/after evidence")));
}

#[test]
fn verified_mode_passes_with_real_evidence() {
    let f = fixture(RunFlags { verified: true, ..RunFlags::default() });
    let before = f.paths.evidence_dir().join("step_0_before.png");
    let after = f.paths.evidence_dir().join("step_0_after.png");
    std::fs::write(&before, b"png").unwrap();
    std::fs::write(&after, b"png").unwrap();

    let mut draft = ReportDraft::new("t", "goal");
    let mut outcome = StepOutcome::ok(0, true);
    outcome.evidence_before = Some(before.display().to_string());
    outcome.evidence_after = Some(after.display().to_string());
    draft.push_outcome(outcome);
    draft.push_action("cmd: playwright open http://x".to_string());
    draft.push_evidence(before.display().to_string());
    draft.push_evidence(after.display().to_string());

    let report = finalize_run(input(&f, draft), &f.status, 2_000);
    assert_eq!(report.result, RunResult::Success);
    assert_eq!(report.evidence_paths.len(), 2);
}

#[test]
fn narrative_only_run_with_observations_is_partial() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_observation("page loaded");

    let report = finalize_run(input(&f, draft), &f.status, 2_000);
    assert_eq!(report.result, RunResult::Partial);
}

#[test]
fn structured_findings_render_into_the_report() {
    let f = fixture(RunFlags::default());
    let mut draft = ReportDraft::new("t", "goal");
    draft.push_outcome(StepOutcome::failed(0, StepStatus::Timeout, true));

    let mut input = input(&f, draft);
    input.findings.push(
        obr_core::Finding::new(obr_core::FindingKind::Ui, 0, "interactive_timeout")
            .attempted("click selector:#never")
            .next_best_action("human_assist"),
    );
    let report = finalize_run(input, &f.status, 2_000);

    assert!(report.ui_findings.iter().any(|e| e
        == "step 0: interactive_timeout [attempted: click selector:#never] [next: human_assist]"));
}
