// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

// Control color is a pure function of the four booleans; first match wins.
#[parameterized(
    incident_wins = { true, true, true, true, ControlColor::Red },
    incident_over_idle = { false, false, true, true, ControlColor::Red },
    learning = { true, true, false, true, ControlColor::Orange },
    controlled = { true, false, false, true, ControlColor::Blue },
    idle_online = { false, false, false, true, ControlColor::Green },
    offline = { false, false, false, false, ControlColor::Gray },
)]
fn color_derivation(
    controlled: bool,
    learning: bool,
    incident: bool,
    online: bool,
    expected: ControlColor,
) {
    assert_eq!(ControlColor::derive(controlled, learning, incident, online), expected);
}

#[test]
fn state_labels() {
    assert_eq!(ControlState::derive(true, false, false, true).label, "ASSISTANT CONTROL");
    assert_eq!(ControlState::derive(false, true, false, true).label, "USER CONTROL");
    assert_eq!(ControlState::derive(false, false, true, true).label, "INCIDENT");
    assert_eq!(ControlState::derive(false, false, false, true).label, "IDLE");
    assert_eq!(ControlState::derive(false, false, false, false).label, "OFFLINE");
}

#[test]
fn overlay_required_iff_active_boolean() {
    assert!(ControlState::overlay_required(true, false, false));
    assert!(ControlState::overlay_required(false, true, false));
    assert!(ControlState::overlay_required(false, false, true));
    assert!(!ControlState::overlay_required(false, false, false));
}

#[test]
fn snapshot_control_state_matches_booleans() {
    let snap = StateSnapshot {
        session_id: "web-1".into(),
        url: "http://localhost:5173".into(),
        title: "App".into(),
        controlled: false,
        learning_active: true,
        incident_open: false,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    };
    assert_eq!(snap.control_state().color, ControlColor::Orange);
}

#[test]
fn control_action_wire_shape() {
    let json = serde_json::to_string(&ControlAction::Release).unwrap();
    assert_eq!(json, "{\"action\":\"release\"}");
    let back: ControlAction = serde_json::from_str("{\"action\":\"ack\"}").unwrap();
    assert_eq!(back, ControlAction::Ack);
}

#[test]
fn observer_event_roundtrip() {
    let event = ObserverEvent {
        kind: ObserverKind::NetworkError,
        step: 2,
        payload: serde_json::json!({"status": 503, "url": "http://x/api"}),
        ts: 1_000,
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: ObserverEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
