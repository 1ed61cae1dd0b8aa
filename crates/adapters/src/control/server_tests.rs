// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::control::{probe_agent, send_action, send_event, ControlError};
use obr_core::{ControlAction, ControlColor, ObserverEvent, ObserverKind, StateSnapshot};

fn snapshot() -> StateSnapshot {
    StateSnapshot {
        session_id: "web-test".into(),
        url: "http://localhost:5173".into(),
        title: "App".into(),
        controlled: true,
        learning_active: false,
        incident_open: false,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    }
}

#[tokio::test]
async fn state_roundtrip_over_loopback() {
    let handle = ControlAgent::start(snapshot()).await.unwrap();
    let state = probe_agent(handle.port()).await.unwrap();
    assert_eq!(state, snapshot());
    assert_eq!(state.control_state().color, ControlColor::Blue);
}

#[tokio::test]
async fn release_action_clears_control() {
    let mut handle = ControlAgent::start(snapshot()).await.unwrap();
    let mut actions = handle.take_actions().unwrap();

    let outcome = send_action(handle.port(), ControlAction::Release).await.unwrap();
    assert!(outcome.ok);
    assert!(!outcome.state.controlled);
    assert!(!outcome.state.learning_active);
    assert_eq!(actions.recv().await, Some(ControlAction::Release));
    assert!(!handle.snapshot().controlled);
}

#[tokio::test]
async fn ack_clears_incident_and_counts() {
    let mut initial = snapshot();
    initial.incident_open = true;
    let handle = ControlAgent::start(initial).await.unwrap();

    let outcome = send_action(handle.port(), ControlAction::Ack).await.unwrap();
    assert!(!outcome.state.incident_open);
    assert_eq!(outcome.state.ack_count, 1);
    assert!(outcome.state.last_ack_at.is_some());
}

#[tokio::test]
async fn events_flow_to_the_engine_channel() {
    let mut handle = ControlAgent::start(snapshot()).await.unwrap();
    let mut events = handle.take_events().unwrap();

    let event = ObserverEvent {
        kind: ObserverKind::ManualClick,
        step: 2,
        payload: serde_json::json!({"selector": "#player-stop-btn", "text": "Stop"}),
        ts: 1_000,
    };
    send_event(handle.port(), &event).await.unwrap();
    assert_eq!(events.recv().await, Some(event));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let handle = ControlAgent::start(snapshot()).await.unwrap();
    let err = crate::control::agent_get(handle.port(), "/nope").await.unwrap_err();
    assert!(matches!(err, ControlError::Http { status: 404, .. }));
}

#[tokio::test]
async fn malformed_event_body_is_400() {
    let handle = ControlAgent::start(snapshot()).await.unwrap();
    let err = crate::control::agent_post(handle.port(), "/event", "{nope").await.unwrap_err();
    assert!(matches!(err, ControlError::Http { status: 400, .. }));
}

#[tokio::test]
async fn update_state_is_visible_to_clients() {
    let handle = ControlAgent::start(snapshot()).await.unwrap();
    handle.update_state(|s| {
        s.learning_active = true;
        s.controlled = false;
    });
    let state = probe_agent(handle.port()).await.unwrap();
    assert_eq!(state.control_state().color, ControlColor::Orange);
}

#[tokio::test]
async fn probe_after_stop_is_offline() {
    let mut handle = ControlAgent::start(snapshot()).await.unwrap();
    let port = handle.port();
    handle.stop();
    // Give the accept loop a moment to wind down.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(matches!(probe_agent(port).await, Err(ControlError::Offline)));
}
