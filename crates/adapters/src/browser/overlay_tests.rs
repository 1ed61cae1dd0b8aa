// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_core::ControlState;

#[test]
fn topbar_reflects_state_color_and_label() {
    let state = ControlState::derive(false, true, false, true);
    let script = topbar_script(&state, "Me he atascado en: click \"Stop\"", 40_123);
    assert!(script.contains("#d07a1e"), "orange border for learning");
    assert!(script.contains("USER CONTROL"));
    assert!(script.contains("Me he atascado en"));
    assert!(script.contains("127.0.0.1:40123/action"));
}

#[test]
fn topbar_exposes_all_actions() {
    let state = ControlState::derive(true, false, false, true);
    let script = topbar_script(&state, "", 1);
    for action in ["refresh", "release", "close", "ack"] {
        assert!(script.contains(action), "{action}");
    }
}

#[test]
fn message_is_json_escaped() {
    let state = ControlState::derive(true, false, false, true);
    let script = topbar_script(&state, "line\"with quotes\"", 1);
    assert!(script.contains("line\\\"with quotes\\\""));
}

#[test]
fn observer_script_updates_step_in_place() {
    let script = observer_script(9_000, 3);
    assert!(script.contains("window.__obrObserverStep = 3"));
    assert!(script.contains(TOPBAR_ID), "chrome clicks are filtered at the source");
}

#[test]
fn cursor_script_is_idempotent() {
    let script = cursor_script();
    assert!(script.contains(CURSOR_ID));
    assert!(script.starts_with("(() => {\n  if (document.getElementById("));
}
