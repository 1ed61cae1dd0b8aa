// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_adapters::browser::CdpEvent;
use obr_core::{SystemClock, WebSession, WebSessionId};
use obr_storage::SessionRegistry;
use serde_json::json;

fn registry() -> (tempfile::TempDir, SessionRegistry) {
    let tmp = tempfile::tempdir().unwrap();
    let registry = SessionRegistry::new(tmp.path().join("web_sessions"));
    (tmp, registry)
}

fn dead_session(id: &str) -> WebSession {
    // A reaped child gives us a pid that is guaranteed dead.
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    WebSession::new(
        WebSessionId::from_string(id),
        pid,
        "ws://127.0.0.1:1/devtools/browser/x".to_string(),
        1,
        1_000,
    )
}

#[test]
fn devtools_port_extraction() {
    assert_eq!(devtools_port("ws://127.0.0.1:39541/devtools/browser/abc"), Some(39_541));
    assert_eq!(devtools_port("ws://127.0.0.1/devtools"), None);
    assert_eq!(devtools_port("not-a-url"), None);
}

#[test]
fn console_error_translates() {
    let event = CdpEvent {
        method: "Runtime.consoleAPICalled".to_string(),
        params: json!({"type": "error", "args": [{"value": "boom"}, {"description": "at app.js:1"}]}),
    };
    let observer = translate_event(&event).unwrap();
    assert_eq!(observer.kind, obr_core::ObserverKind::ConsoleError);
    assert_eq!(observer.payload["text"], "boom at app.js:1");
}

#[test]
fn console_log_is_ignored() {
    let event = CdpEvent {
        method: "Runtime.consoleAPICalled".to_string(),
        params: json!({"type": "log", "args": [{"value": "hello"}]}),
    };
    assert!(translate_event(&event).is_none());
}

#[test]
fn http_error_response_translates() {
    let event = CdpEvent {
        method: "Network.responseReceived".to_string(),
        params: json!({"response": {"status": 503, "url": "http://x/api"}}),
    };
    let observer = translate_event(&event).unwrap();
    assert_eq!(observer.kind, obr_core::ObserverKind::NetworkError);
    assert_eq!(observer.payload["status"], 503);
}

#[test]
fn http_ok_response_is_ignored() {
    let event = CdpEvent {
        method: "Network.responseReceived".to_string(),
        params: json!({"response": {"status": 204, "url": "http://x/api"}}),
    };
    assert!(translate_event(&event).is_none());
}

#[test]
fn loading_failure_translates() {
    let event = CdpEvent {
        method: "Network.loadingFailed".to_string(),
        params: json!({"errorText": "net::ERR_CONNECTION_REFUSED"}),
    };
    let observer = translate_event(&event).unwrap();
    assert_eq!(observer.payload["error"], "net::ERR_CONNECTION_REFUSED");
}

#[tokio::test]
async fn liveness_fails_for_dead_pid() {
    let session = dead_session("web-dead");
    assert!(!probe_liveness(&session).await);
}

#[tokio::test]
async fn attach_refuses_dead_session_and_marks_it_closed() {
    let (_tmp, registry) = registry();
    let session = dead_session("web-dead");
    registry.save(&session).unwrap();

    let err = attach_session(&registry, &session.session_id, &SystemClock).await.unwrap_err();
    assert!(matches!(err, crate::EngineError::SessionDead(_)));
    assert!(registry.load(&session.session_id).unwrap().closed);
}

#[tokio::test]
async fn attach_refuses_already_closed_session() {
    let (_tmp, registry) = registry();
    let mut session = dead_session("web-closed");
    session.closed = true;
    registry.save(&session).unwrap();

    let err = attach_session(&registry, &session.session_id, &SystemClock).await.unwrap_err();
    assert!(matches!(err, crate::EngineError::SessionDead(_)));
}

#[test]
fn release_keeps_incident_open() {
    let (_tmp, registry) = registry();
    let mut session = dead_session("web-rel");
    session.controlled = true;
    session.incident_open = true;
    registry.save(&session).unwrap();

    let released = release_session(&registry, &session.session_id).unwrap();
    assert!(!released.controlled);
    assert!(released.incident_open, "release never clears an incident");
}

#[tokio::test]
async fn ack_from_the_overlay_is_persisted() {
    let (_tmp, registry) = registry();
    let mut session = dead_session("web-ack");
    session.incident_open = true;
    registry.save(&session).unwrap();

    let snapshot = obr_core::StateSnapshot {
        session_id: "web-ack".into(),
        url: String::new(),
        title: String::new(),
        controlled: false,
        learning_active: false,
        incident_open: true,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    };
    let mut agent = obr_adapters::control::ControlAgent::start(snapshot).await.unwrap();
    spawn_action_listener(agent.take_actions().unwrap(), registry.clone(), session.session_id.clone());

    let outcome =
        obr_adapters::control::send_action(agent.port(), obr_core::ControlAction::Ack).await.unwrap();
    assert!(!outcome.state.incident_open);

    // The listener lands the ack in the registry within a poll cycle.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let persisted = registry.load(&session.session_id).unwrap();
    assert!(!persisted.incident_open);
    assert_eq!(persisted.ack_count, 1);
    assert!(persisted.last_ack_at.is_some());
}

#[tokio::test]
async fn release_from_the_overlay_keeps_incident_open() {
    let (_tmp, registry) = registry();
    let mut session = dead_session("web-relbtn");
    session.controlled = true;
    session.incident_open = true;
    registry.save(&session).unwrap();

    let snapshot = obr_core::StateSnapshot {
        session_id: "web-relbtn".into(),
        url: String::new(),
        title: String::new(),
        controlled: true,
        learning_active: false,
        incident_open: true,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    };
    let mut agent = obr_adapters::control::ControlAgent::start(snapshot).await.unwrap();
    spawn_action_listener(agent.take_actions().unwrap(), registry.clone(), session.session_id.clone());

    obr_adapters::control::send_action(agent.port(), obr_core::ControlAction::Release).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let persisted = registry.load(&session.session_id).unwrap();
    assert!(!persisted.controlled);
    assert!(persisted.incident_open, "release never clears an incident");
}

#[test]
fn close_terminates_browser_and_marks_closed() {
    let (_tmp, registry) = registry();
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let session = WebSession::new(
        WebSessionId::from_string("web-close"),
        child.id(),
        "ws://127.0.0.1:1/devtools/browser/x".to_string(),
        1,
        1_000,
    );
    registry.save(&session).unwrap();

    let closed = close_session(&registry, &session.session_id).unwrap();
    assert!(closed.closed);
    assert!(!closed.controlled);

    // SIGTERM lands shortly after.
    let status = child.wait().unwrap();
    assert!(!status.success());
}
