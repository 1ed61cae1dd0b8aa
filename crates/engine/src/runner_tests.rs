// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::observers::ObserverSource;
use obr_adapters::control::{send_event, ControlAgent};
use obr_adapters::{FakePage, PageCall};
use obr_core::run::Deadlines;
use obr_core::{
    ObserverEvent, ObserverKind, RunContext, RunFlags, RunId, StateSnapshot, SystemClock,
    TeachingCapture, WebSession,
};
use obr_storage::{LearningStore, RunsRoot, SessionRegistry};

pub(crate) struct Harness {
    pub tmp: tempfile::TempDir,
    pub fake: FakePage,
    pub registry: SessionRegistry,
    pub learning: LearningStore,
    pub agent_port: u16,
    pub runner: WebRunner<SystemClock>,
}

pub(crate) fn fast_deadlines() -> Deadlines {
    Deadlines { interactive_ms: 200, step_hard_ms: 1_000, run_hard_ms: 5_000 }
}

pub(crate) async fn harness(flags: RunFlags, deadlines: Deadlines) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let root = RunsRoot::new(tmp.path().join("runs"));
    let paths = root.allocate_run(&RunId::from("test-run-1")).unwrap();

    let registry = SessionRegistry::new(root.sessions_dir());
    let session_id = WebSessionId::from_string("web-harness");
    let session = WebSession::new(
        session_id.clone(),
        std::process::id(),
        "ws://127.0.0.1:1/devtools/browser/x".to_string(),
        0,
        1_000,
    );
    registry.save(&session).unwrap();

    let learning = LearningStore::new(root.learning_file());

    let snapshot = StateSnapshot {
        session_id: session_id.as_str().to_string(),
        url: "http://localhost:5173/".to_string(),
        title: "App".to_string(),
        controlled: false,
        learning_active: false,
        incident_open: false,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    };
    let mut agent = ControlAgent::start(snapshot).await.unwrap();
    let agent_port = agent.port();
    let events = agent.take_events().unwrap();

    let fake = FakePage::new();
    let ctx = RunContext::builder()
        .run_dir(paths.run_dir.clone())
        .flags(flags)
        .deadlines(deadlines)
        .build();
    let deps = WebRunDeps {
        driver: Arc::new(fake.clone()),
        registry: registry.clone(),
        learning: learning.clone(),
        session_id,
        agent_port,
        observers: ObserverSource::channel(events),
        agent: Some(agent),
    };
    let runner = WebRunner::new(ctx, paths, deps, SystemClock);

    Harness { tmp, fake, registry, learning, agent_port, runner }
}

pub(crate) fn step(index: usize, kind: StepKind) -> Step {
    Step { index, kind, optional: false, origin: obr_core::StepOrigin::Task }
}

pub(crate) fn plan(kinds: Vec<StepKind>) -> Plan {
    Plan { steps: kinds.into_iter().enumerate().map(|(i, k)| step(i, k)).collect() }
}

#[tokio::test]
async fn demo_login_run_records_both_actions() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    h.fake.make_actionable(&Target::Text("Entrar demo".to_string()));

    let plan = plan(vec![
        StepKind::OpenUrl { url: "http://localhost:5173".into() },
        StepKind::ClickText { text: "Entrar demo".into() },
    ]);
    let summary = h.runner.run(&plan).await;

    assert_eq!(
        summary.draft.actions,
        vec![
            "cmd: playwright open http://localhost:5173".to_string(),
            "cmd: playwright click text:Entrar demo".to_string(),
        ]
    );
    assert!(summary.draft.outcomes.iter().all(|o| o.status.is_ok()));
    // Timed-out steps append nothing; here everything succeeded.
    assert_eq!(summary.draft.actions.len(), summary.draft.ok_interactive());
    assert!(summary.verify_ok);
    assert!(!summary.run_timed_out);
}

#[tokio::test]
async fn success_writes_before_and_after_evidence() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    h.fake.make_actionable(&Target::Selector("#go".to_string()));
    let run_dir = h.runner.paths.run_dir.clone();

    let summary = h.runner.run(&plan(vec![StepKind::ClickSelector { selector: "#go".into() }])).await;

    let outcome = &summary.draft.outcomes[0];
    assert!(outcome.status.is_ok());
    let before = outcome.evidence_before.as_deref().unwrap();
    let after = outcome.evidence_after.as_deref().unwrap();
    assert!(std::path::Path::new(before).exists());
    assert!(std::path::Path::new(after).exists());
    assert!(before.starts_with(run_dir.to_str().unwrap()));
    // Baseline context shot from bootstrap is also present.
    assert!(summary.draft.evidence_paths.iter().any(|p| p.ends_with("step_0_context.png")));
}

#[tokio::test]
async fn timeout_appends_no_action() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    h.fake.make_actionable(&Target::Selector("#never".to_string()));
    h.fake.make_hanging(&Target::Selector("#never".to_string()));

    let summary = h.runner.run(&plan(vec![StepKind::ClickSelector { selector: "#never".into() }])).await;

    assert!(summary.draft.actions.is_empty());
    assert_eq!(summary.draft.outcomes[0].status, StepStatus::Timeout);
    assert!(summary
        .findings
        .iter()
        .any(|f| f.what_failed == "interactive_timeout" && f.where_step == 0));
    assert_eq!(summary.draft.actions.len(), summary.draft.ok_interactive());
}

#[tokio::test]
async fn precheck_failure_is_target_not_found_without_click() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;

    let summary = h.runner.run(&plan(vec![StepKind::ClickSelector { selector: "#ghost".into() }])).await;

    assert_eq!(summary.draft.outcomes[0].status, StepStatus::TargetNotFound);
    let calls = h.fake.calls();
    assert!(calls.contains(&PageCall::Probe("selector:#ghost".to_string())));
    assert!(!calls.iter().any(|c| matches!(c, PageCall::Click(_))));
}

#[tokio::test]
async fn learned_selector_resolves_stuck_click() {
    let flags = RunFlags { teaching: true, ..RunFlags::default() };
    let h = harness(flags, fast_deadlines()).await;

    // Run 1 in this story taught us #player-stop-btn on the catalog
    // screen; seed the global store the way that run would have.
    let key = obr_core::context_key("localhost:5173", "catalog");
    h.learning
        .merge_capture(&TeachingCapture {
            selector: "#player-stop-btn".to_string(),
            text: "Stop".to_string(),
            url: "http://localhost:5173/catalog".to_string(),
            context_key: key.clone(),
            scroll_hints: vec![],
            timestamp: 1_000,
        })
        .unwrap();
    h.fake.make_actionable(&Target::Selector("#player-stop-btn".to_string()));

    let summary = h.runner.run(&plan(vec![StepKind::ClickText { text: "Stop".into() }])).await;

    let outcome = &summary.draft.outcomes[0];
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.selector_used.as_deref(), Some("#player-stop-btn"));
    assert_eq!(outcome.retries, 1);
    assert!(summary
        .draft
        .actions
        .contains(&"cmd: playwright click selector:#player-stop-btn".to_string()));

    let ranked = h.learning.ranked(&key).unwrap();
    assert_eq!(ranked[0].success_count, 2);
}

#[tokio::test]
async fn stuck_iframe_focus_disables_pointer_events() {
    let deadlines = Deadlines { interactive_ms: 50, step_hard_ms: 1_000, run_hard_ms: 5_000 };
    let h = harness(RunFlags::default(), deadlines).await;
    h.fake.set_focus_in_iframe(true);
    h.fake.make_actionable(&Target::Selector("#video".to_string()));
    h.fake.make_unclickable(&Target::Selector("#video".to_string()));

    // Let the useful-progress window lapse so the guard escalates.
    tokio::time::sleep(Duration::from_millis(80)).await;
    let summary = h.runner.run(&plan(vec![StepKind::ClickSelector { selector: "#video".into() }])).await;

    assert!(summary.findings.iter().any(|f| f.what_failed == "stuck_iframe_focus"));
    assert_eq!(summary.draft.outcomes[0].status, StepStatus::StuckIframe);
    let calls = h.fake.calls();
    assert!(calls.contains(&PageCall::DisablePointerEvents));
    assert!(calls.contains(&PageCall::EscapeIframe));
}

#[tokio::test]
async fn window_steps_are_skipped_in_web_mode() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    let summary = h
        .runner
        .run(&plan(vec![StepKind::Window { op: obr_core::WindowOp::List }]))
        .await;
    assert_eq!(summary.draft.outcomes[0].status, StepStatus::Skipped);
    assert!(summary.draft.actions.is_empty());
}

#[tokio::test]
async fn failed_verify_downgrades_and_anchors_to_previous_step() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    h.fake.make_actionable(&Target::Selector("#go".to_string()));

    let summary = h
        .runner
        .run(&plan(vec![
            StepKind::ClickSelector { selector: "#go".into() },
            StepKind::VerifyVisible { target: "#done".into() },
        ]))
        .await;

    assert!(!summary.verify_ok);
    assert!(summary
        .findings
        .iter()
        .any(|f| f.what_failed.starts_with("verify failed") && f.where_step == 0));
}

#[tokio::test]
async fn hard_run_deadline_short_circuits_the_plan() {
    let deadlines = Deadlines { interactive_ms: 200, step_hard_ms: 1_000, run_hard_ms: 0 };
    let h = harness(RunFlags::default(), deadlines).await;

    let summary = h.runner.run(&plan(vec![StepKind::OpenUrl { url: "http://x.test".into() }])).await;

    assert!(summary.run_timed_out);
    assert!(summary.draft.outcomes.is_empty());
    assert!(summary.findings.iter().any(|f| f.what_failed == "run_timeout"));
}

#[tokio::test]
async fn observer_events_become_findings_with_step_stamp() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    h.fake.make_actionable(&Target::Selector("#go".to_string()));

    send_event(
        h.agent_port,
        &ObserverEvent {
            kind: ObserverKind::ConsoleError,
            step: 0,
            payload: serde_json::json!({"text": "boom"}),
            ts: 1,
        },
    )
    .await
    .unwrap();
    send_event(
        h.agent_port,
        &ObserverEvent {
            kind: ObserverKind::NetworkError,
            step: 0,
            payload: serde_json::json!({"status": 503, "url": "http://x/api"}),
            ts: 2,
        },
    )
    .await
    .unwrap();

    let summary = h.runner.run(&plan(vec![StepKind::ClickSelector { selector: "#go".into() }])).await;

    assert!(summary.draft.console_errors.iter().any(|e| e == "step 0: boom"));
    assert!(summary.draft.network_findings.iter().any(|e| e == "step 0: HTTP 503 http://x/api"));
}

#[tokio::test]
async fn control_is_released_at_teardown() {
    let h = harness(RunFlags::default(), fast_deadlines()).await;
    h.fake.make_actionable(&Target::Selector("#go".to_string()));
    let registry = h.registry.clone();

    let _ = h.runner.run(&plan(vec![StepKind::ClickSelector { selector: "#go".into() }])).await;

    let session = registry.load(&WebSessionId::from_string("web-harness")).unwrap();
    assert!(!session.controlled);
    assert!(!session.learning_active);
    assert!(session.current_run_id.is_none());
}
