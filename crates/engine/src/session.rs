// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: open, attach, release, close.
//!
//! A session owns its browser process and control agent; runs borrow
//! page control and must release it before another run may attach.
//! Liveness is `(pid alive) ∧ (devtools reachable) ∧ (agent responds)`.

use crate::EngineError;
use obr_adapters::browser::{launch_browser, pid_alive, poll_json_version, CdpClient, CdpEvent, CdpPage};
use obr_adapters::control::{probe_agent, send_event, ControlAgent, ControlAgentHandle};
use obr_adapters::PageDriver;
use obr_core::{Clock, ControlAction, ObserverEvent, ObserverKind, StateSnapshot, WebSession, WebSessionId};
use obr_storage::SessionRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

const LAUNCH_DEADLINE: Duration = Duration::from_secs(20);
const CONNECT_DEADLINE: Duration = Duration::from_secs(10);

/// A freshly opened session with its in-process control agent.
pub struct OpenSession {
    pub session: WebSession,
    pub page: Arc<dyn PageDriver>,
    pub agent: ControlAgentHandle,
}

/// Open a new browser session: launch, connect devtools, start the
/// control agent, install listeners, and register it.
pub async fn open_session(
    registry: &SessionRegistry,
    profile_root: &std::path::Path,
    url: Option<&str>,
    headed: bool,
    clock: &impl Clock,
) -> Result<OpenSession, EngineError> {
    let session_id = WebSessionId::new();
    let profile = profile_root.join(format!("{}.profile", session_id.as_str()));

    let handle = launch_browser(&profile, headed, LAUNCH_DEADLINE)
        .await
        .map_err(|e| EngineError::Bootstrap(e.to_string()))?;

    let (cdp_tx, cdp_rx) = mpsc::channel::<CdpEvent>(256);
    let client = CdpClient::connect(&handle.cdp_endpoint, cdp_tx, CONNECT_DEADLINE)
        .await
        .map_err(|e| EngineError::Bootstrap(e.to_string()))?;
    let page = CdpPage::new(client);
    page.enable_domains(CONNECT_DEADLINE)
        .await
        .map_err(|e| EngineError::Bootstrap(e.to_string()))?;

    if let Some(url) = url {
        page.navigate(url, CONNECT_DEADLINE).await?;
    }

    let snapshot = StateSnapshot {
        session_id: session_id.as_str().to_string(),
        url: page.url().await.unwrap_or_default(),
        title: page.title().await.unwrap_or_default(),
        controlled: false,
        learning_active: false,
        incident_open: false,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    };
    let mut agent = ControlAgent::start(snapshot).await?;
    spawn_devtools_listener(cdp_rx, EventSink::Channel(agent.event_sender()));
    if let Some(actions) = agent.take_actions() {
        spawn_action_listener(actions, registry.clone(), session_id.clone());
    }

    let mut session = WebSession::new(
        session_id,
        handle.pid,
        handle.cdp_endpoint.clone(),
        agent.port(),
        clock.epoch_ms(),
    );
    session.url = page.url().await.unwrap_or_default();
    session.title = page.title().await.unwrap_or_default();
    registry.save(&session)?;

    tracing::info!(session_id = %session.session_id, pid = session.pid, port = session.agent_port, "web session opened");
    Ok(OpenSession { session, page: Arc::new(page), agent })
}

/// An attached session: page control plus the polling observer cursor.
pub struct AttachedSession {
    pub session: WebSession,
    pub page: Arc<dyn PageDriver>,
}

impl std::fmt::Debug for AttachedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Attach to an existing session after a full liveness probe. A dead
/// session is marked closed and refused.
pub async fn attach_session(
    registry: &SessionRegistry,
    id: &WebSessionId,
    clock: &impl Clock,
) -> Result<AttachedSession, EngineError> {
    let session = registry.load(id)?;
    if session.closed || !probe_liveness(&session).await {
        let _ = registry.update(id, |s| s.closed = true);
        return Err(EngineError::SessionDead(id.as_str().to_string()));
    }

    let (cdp_tx, cdp_rx) = mpsc::channel::<CdpEvent>(256);
    let client = CdpClient::connect(&session.cdp_endpoint, cdp_tx, CONNECT_DEADLINE)
        .await
        .map_err(|e| EngineError::Bootstrap(e.to_string()))?;
    let page = CdpPage::new(client);
    page.enable_domains(CONNECT_DEADLINE)
        .await
        .map_err(|e| EngineError::Bootstrap(e.to_string()))?;

    // Console/network findings reach the engine through the session's
    // agent, merged with the overlay's manual events.
    spawn_devtools_listener(cdp_rx, EventSink::Http(session.agent_port));

    let session = registry.update(id, |s| s.last_seen_at = clock.epoch_ms())?;
    tracing::info!(session_id = %session.session_id, "attached to web session");
    Ok(AttachedSession { session, page: Arc::new(page) })
}

/// Full liveness probe: process, devtools port, control agent.
pub async fn probe_liveness(session: &WebSession) -> bool {
    if !pid_alive(session.pid) {
        return false;
    }
    let Some(port) = devtools_port(&session.cdp_endpoint) else {
        return false;
    };
    if poll_json_version(port, Duration::from_secs(2)).await.is_err() {
        return false;
    }
    probe_agent(session.agent_port).await.is_ok()
}

/// Release page control. Does not clear an open incident.
pub fn release_session(
    registry: &SessionRegistry,
    id: &WebSessionId,
) -> Result<WebSession, EngineError> {
    let session = registry.update(id, WebSession::release)?;
    Ok(session)
}

/// Close a session: terminate the browser and mark the record closed.
pub fn close_session(
    registry: &SessionRegistry,
    id: &WebSessionId,
) -> Result<WebSession, EngineError> {
    let session = registry.update(id, |s| {
        s.release();
        s.closed = true;
    })?;
    obr_adapters::browser::terminate_pid(session.pid);
    tracing::info!(session_id = %session.session_id, "web session closed");
    Ok(session)
}

fn devtools_port(endpoint: &str) -> Option<u16> {
    endpoint.split("://").nth(1)?.split('/').next()?.split(':').nth(1)?.parse().ok()
}

/// Persist overlay/CLI control actions into the registry. The agent's
/// in-memory mirror already applied them; this makes them durable, so
/// `status` and later runs see acks and releases.
pub(crate) fn spawn_action_listener(
    mut actions: mpsc::Receiver<ControlAction>,
    registry: SessionRegistry,
    session_id: WebSessionId,
) {
    tokio::spawn(async move {
        while let Some(action) = actions.recv().await {
            let result: Result<(), String> = match action {
                ControlAction::Refresh => continue,
                ControlAction::Ack => {
                    let now = epoch_ms();
                    registry
                        .update(&session_id, |s| s.ack(now))
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
                ControlAction::Release => release_session(&registry, &session_id)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                ControlAction::Close => close_session(&registry, &session_id)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
            };
            match result {
                Ok(()) => tracing::info!(%session_id, %action, "control action persisted"),
                Err(e) => tracing::warn!(%session_id, %action, error = %e, "control action failed"),
            }
        }
    });
}

fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

enum EventSink {
    Channel(mpsc::Sender<ObserverEvent>),
    Http(u16),
}

/// Translate devtools events into observer events. The step index is
/// stamped by the engine at receipt; here it is zero.
fn spawn_devtools_listener(mut cdp_rx: mpsc::Receiver<CdpEvent>, sink: EventSink) {
    tokio::spawn(async move {
        while let Some(event) = cdp_rx.recv().await {
            let Some(observer) = translate_event(&event) else {
                continue;
            };
            match &sink {
                EventSink::Channel(tx) => {
                    let _ = tx.try_send(observer);
                }
                EventSink::Http(port) => {
                    let _ = send_event(*port, &observer).await;
                }
            }
        }
    });
}

fn translate_event(event: &CdpEvent) -> Option<ObserverEvent> {
    let observer = |kind, payload| {
        Some(ObserverEvent { kind, step: 0, payload, ts: 0 })
    };
    match event.method.as_str() {
        "Runtime.consoleAPICalled" => {
            if event.params.get("type").and_then(Value::as_str) != Some("error") {
                return None;
            }
            let text = event
                .params
                .get("args")
                .and_then(Value::as_array)
                .map(|args| {
                    args.iter()
                        .filter_map(|a| {
                            a.get("value")
                                .and_then(Value::as_str)
                                .map(str::to_string)
                                .or_else(|| a.get("description").and_then(Value::as_str).map(str::to_string))
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            observer(ObserverKind::ConsoleError, serde_json::json!({ "text": text }))
        }
        "Runtime.exceptionThrown" => {
            let text = event
                .params
                .pointer("/exceptionDetails/exception/description")
                .or_else(|| event.params.pointer("/exceptionDetails/text"))
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception")
                .to_string();
            observer(ObserverKind::PageError, serde_json::json!({ "text": text }))
        }
        "Network.responseReceived" => {
            let status = event.params.pointer("/response/status").and_then(Value::as_u64)?;
            if status < 400 {
                return None;
            }
            let url = event
                .params
                .pointer("/response/url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            observer(ObserverKind::NetworkError, serde_json::json!({ "status": status, "url": url }))
        }
        "Network.loadingFailed" => {
            let error = event
                .params
                .get("errorText")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            observer(ObserverKind::NetworkError, serde_json::json!({ "error": error }))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
