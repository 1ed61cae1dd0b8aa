// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    simple = { "Open the dashboard", "open-the-dashboard-1000" },
    spanish = { "abre http://localhost:5173, haz click", "abre-http-localhost-5173-1000" },
    punctuation = { "!!!", "run-1000" },
    collapses_runs = { "a   b", "a-b-1000" },
)]
fn run_id_derivation(task: &str, expected: &str) {
    assert_eq!(RunId::derive(task, 1000).as_str(), expected);
}

#[test]
fn run_id_collision_suffix() {
    let id = RunId::derive("open app", 42);
    assert_eq!(id.with_collision_suffix(2).as_str(), "open-app-42-2");
    assert_eq!(id.with_collision_suffix(3).as_str(), "open-app-42-3");
}

#[test]
fn mode_serde_lowercase() {
    assert_eq!(serde_json::to_string(&Mode::Web).unwrap(), "\"web\"");
    let m: Mode = serde_json::from_str("\"gui\"").unwrap();
    assert_eq!(m, Mode::Gui);
}

#[test]
fn run_context_prompt_json_roundtrip() {
    let ctx = RunContext::builder()
        .task("abre http://localhost:5173")
        .attach_session_id(crate::WebSessionId::from_string("web-abc"))
        .build();
    let json = serde_json::to_string(&ctx).unwrap();
    let back: RunContext = serde_json::from_str(&json).unwrap();
    assert_eq!(back.task, ctx.task);
    assert_eq!(back.mode, Mode::Web);
    assert_eq!(back.attach_session_id, ctx.attach_session_id);
    assert_eq!(back.deadlines, ctx.deadlines);
}

#[test]
fn deadlines_expose_durations() {
    let d = Deadlines { interactive_ms: 8_000, step_hard_ms: 20_000, run_hard_ms: 120_000 };
    assert_eq!(d.interactive().as_secs(), 8);
    assert_eq!(d.step_hard().as_secs(), 20);
    assert_eq!(d.run_hard().as_secs(), 120);
}

#[test]
fn run_status_display() {
    assert_eq!(RunStatus::Running.to_string(), "running");
    assert_eq!(RunStatus::Completed.to_string(), "completed");
    assert_eq!(RunStatus::Failed.to_string(), "failed");
}
