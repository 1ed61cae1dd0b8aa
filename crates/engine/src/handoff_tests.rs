// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::runner::tests::{fast_deadlines, harness, plan};
use obr_adapters::control::send_event;
use obr_adapters::Target;
use obr_core::{ObserverEvent, ObserverKind, RunFlags, StepKind, StepStatus, WebSessionId};
use std::time::Duration;

fn teaching() -> RunFlags {
    RunFlags { teaching: true, ..RunFlags::default() }
}

fn manual_click(selector: &str, text: &str, scroll_y: i64) -> ObserverEvent {
    ObserverEvent {
        kind: ObserverKind::ManualClick,
        step: 0,
        payload: serde_json::json!({"selector": selector, "text": text, "scrollY": scroll_y}),
        ts: 1_000,
    }
}

#[tokio::test]
async fn useful_manual_click_is_learned_and_resumed() {
    let mut h = harness(teaching(), fast_deadlines()).await;
    h.runner.set_learning_window(Duration::from_secs(3));
    h.fake.make_actionable(&Target::Selector("#player-stop-btn".to_string()));

    let port = h.agent_port;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let _ = send_event(port, &manual_click("#player-stop-btn", "Stop", 300)).await;
    });

    let learning = h.learning.clone();
    let teaching_file = h.runner.paths.teaching_file(1);
    let summary = h.runner.run(&plan(vec![StepKind::ClickText { text: "Stop".into() }])).await;

    // Learning-resume re-ran the stuck step with the captured selector.
    assert!(!summary.handoff_pending);
    let outcome = &summary.draft.outcomes[0];
    assert!(outcome.status.is_ok());
    assert_eq!(outcome.selector_used.as_deref(), Some("#player-stop-btn"));
    assert!(summary
        .draft
        .actions
        .contains(&"cmd: playwright click selector:#player-stop-btn".to_string()));

    // Per-run artifact plus the global store, scroll hint included.
    assert!(teaching_file.exists());
    let key = obr_core::context_key("localhost:5173", "catalog");
    let ranked = learning.ranked(&key).unwrap();
    assert_eq!(ranked[0].selector, "#player-stop-btn");
    assert!(ranked[0].success_count >= 2);
    assert_eq!(ranked[0].scroll_hints[0].top, 300);

    assert!(summary
        .findings
        .iter()
        .any(|f| f.what_failed == "target_not_found"
            && f.next_best_action.as_deref() == Some("human_assist")));

    // A resolved handoff opens no incident.
    let session = h.registry.load(&WebSessionId::from_string("web-harness")).unwrap();
    assert!(!session.incident_open);
}

#[tokio::test]
async fn learning_window_expiry_leaves_user_in_control() {
    let mut h = harness(teaching(), fast_deadlines()).await;
    h.runner.set_learning_window(Duration::from_millis(250));

    let registry = h.registry.clone();
    let summary = h.runner.run(&plan(vec![StepKind::ClickText { text: "Stop".into() }])).await;

    assert!(summary.handoff_pending);
    assert_eq!(summary.draft.outcomes[0].status, StepStatus::TargetNotFound);
    assert!(summary.draft.actions.is_empty());

    let session = registry.load(&WebSessionId::from_string("web-harness")).unwrap();
    assert!(!session.controlled, "assistant control stays released");
    // An unresolved handoff opens an incident; only an ack clears it.
    assert!(session.incident_open);
    assert!(!session.learning_active);
}

#[tokio::test]
async fn inconsistent_manual_click_is_not_captured() {
    let mut h = harness(teaching(), fast_deadlines()).await;
    h.runner.set_learning_window(Duration::from_millis(400));

    let port = h.agent_port;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = send_event(port, &manual_click("#unrelated", "Nope", 0)).await;
    });

    let learning = h.learning.clone();
    let summary = h.runner.run(&plan(vec![StepKind::ClickText { text: "Stop".into() }])).await;

    assert!(summary.handoff_pending);
    let key = obr_core::context_key("localhost:5173", "catalog");
    assert!(learning.ranked(&key).unwrap().is_empty());
}

#[tokio::test]
async fn stall_without_step_failure_triggers_handoff() {
    let deadlines = obr_core::run::Deadlines {
        interactive_ms: 60,
        step_hard_ms: 1_000,
        run_hard_ms: 5_000,
    };
    let mut h = harness(teaching(), deadlines).await;
    h.runner.set_learning_window(Duration::from_millis(200));

    // No useful progress for longer than the interactive window.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let summary = h.runner.run(&plan(vec![StepKind::ClickText { text: "Stop".into() }])).await;

    // The stall handoff fired before the step even ran, and the window
    // expired without help.
    assert!(summary.handoff_pending);
    assert!(summary.draft.outcomes.is_empty());
}
