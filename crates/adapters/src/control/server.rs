// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control agent HTTP server.
//!
//! One accept loop handles connections serially; the overlay and the
//! CLI are the only clients, and requests are tiny. The agent owns the
//! authoritative in-memory `StateSnapshot` mirror; registry persistence
//! is the caller's job.

use super::ControlError;
use obr_core::{ControlAction, ObserverEvent, StateSnapshot};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

/// Observer events kept for polling clients (attached runs in another
/// process drain these via `GET /events?since=N`).
const EVENT_BUFFER: usize = 512;

#[derive(Default)]
struct EventBuffer {
    next_seq: u64,
    events: VecDeque<(u64, ObserverEvent)>,
}

impl EventBuffer {
    fn push(&mut self, event: ObserverEvent) {
        if self.events.len() >= EVENT_BUFFER {
            self.events.pop_front();
        }
        self.events.push_back((self.next_seq, event));
        self.next_seq += 1;
    }

    fn since(&self, cursor: u64) -> (u64, Vec<ObserverEvent>) {
        let events =
            self.events.iter().filter(|(seq, _)| *seq >= cursor).map(|(_, e)| e.clone()).collect();
        (self.next_seq, events)
    }
}

pub struct ControlAgent;

/// Running control agent: port, shared state, and the observer/action
/// channels the engine drains.
pub struct ControlAgentHandle {
    port: u16,
    state: Arc<Mutex<StateSnapshot>>,
    shutdown: Option<oneshot::Sender<()>>,
    event_tx: mpsc::Sender<ObserverEvent>,
    events: Option<mpsc::Receiver<ObserverEvent>>,
    actions: Option<mpsc::Receiver<ControlAction>>,
}

impl ControlAgent {
    /// Bind an ephemeral loopback port and start serving.
    pub async fn start(initial: StateSnapshot) -> Result<ControlAgentHandle, ControlError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let state = Arc::new(Mutex::new(initial));
        let buffer = Arc::new(Mutex::new(EventBuffer::default()));
        let (event_tx, event_rx) = mpsc::channel(256);
        let (action_tx, action_rx) = mpsc::channel(16);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let serve_state = state.clone();
        let serve_tx = event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, _)) => {
                                if let Err(e) =
                                    handle_connection(stream, &serve_state, &buffer, &serve_tx, &action_tx).await
                                {
                                    tracing::debug!(error = %e, "control agent connection error");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "control agent accept failed");
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        tracing::info!(port, "control agent listening");
        Ok(ControlAgentHandle {
            port,
            state,
            shutdown: Some(shutdown_tx),
            event_tx,
            events: Some(event_rx),
            actions: Some(action_rx),
        })
    }
}

impl ControlAgentHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().clone()
    }

    /// Mutate the shared state mirror (e.g. after a handoff transition).
    pub fn update_state(&self, f: impl FnOnce(&mut StateSnapshot)) {
        f(&mut self.state.lock());
    }

    /// Take the observer event channel. Callable once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ObserverEvent>> {
        self.events.take()
    }

    /// A sender feeding the same observer channel the overlay posts to
    /// (used by the devtools listener task).
    pub fn event_sender(&self) -> mpsc::Sender<ObserverEvent> {
        self.event_tx.clone()
    }

    /// Take the control action channel. Callable once.
    pub fn take_actions(&mut self) -> Option<mpsc::Receiver<ControlAction>> {
        self.actions.take()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ControlAgentHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: &Arc<Mutex<StateSnapshot>>,
    buffer: &Arc<Mutex<EventBuffer>>,
    event_tx: &mpsc::Sender<ObserverEvent>,
    action_tx: &mpsc::Sender<ControlAction>,
) -> Result<(), ControlError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    // Headers: only Content-Length matters.
    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(val) = lower.strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }
    let body = String::from_utf8_lossy(&body).into_owned();

    let (status, response_body) = route(&method, &path, &body, state, buffer, event_tx, action_tx).await;
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
        response_body.len(),
    );
    write_half.write_all(response.as_bytes()).await?;
    write_half.shutdown().await?;
    Ok(())
}

async fn route(
    method: &str,
    path: &str,
    body: &str,
    state: &Arc<Mutex<StateSnapshot>>,
    buffer: &Arc<Mutex<EventBuffer>>,
    event_tx: &mpsc::Sender<ObserverEvent>,
    action_tx: &mpsc::Sender<ControlAction>,
) -> (&'static str, String) {
    let (route_path, query) = match path.split_once('?') {
        Some((p, q)) => (p, q),
        None => (path, ""),
    };
    match (method, route_path) {
        // Overlay fetches are cross-origin; answer preflights.
        ("OPTIONS", _) => ("204 No Content", String::new()),

        ("GET", "/state") => {
            let snapshot = state.lock().clone();
            match serde_json::to_string(&snapshot) {
                Ok(body) => ("200 OK", body),
                Err(e) => ("500 Internal Server Error", format!("{{\"error\":\"{e}\"}}")),
            }
        }

        ("POST", "/event") => match serde_json::from_str::<ObserverEvent>(body) {
            Ok(event) => {
                buffer.lock().push(event.clone());
                // Observer noise must never block the server.
                let _ = event_tx.try_send(event);
                ("200 OK", "{\"ok\":true}".to_string())
            }
            Err(e) => ("400 Bad Request", format!("{{\"error\":\"{e}\"}}")),
        },

        // Attached runs in another process drain buffered events here.
        ("GET", "/events") => {
            let cursor = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("since="))
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            let (next, events) = buffer.lock().since(cursor);
            match serde_json::to_string(&serde_json::json!({"next": next, "events": events})) {
                Ok(body) => ("200 OK", body),
                Err(e) => ("500 Internal Server Error", format!("{{\"error\":\"{e}\"}}")),
            }
        }

        // Attached runs mirror session transitions into the agent.
        ("POST", "/sync") => match serde_json::from_str::<StateSnapshot>(body) {
            Ok(snapshot) => {
                *state.lock() = snapshot;
                ("200 OK", "{\"ok\":true}".to_string())
            }
            Err(e) => ("400 Bad Request", format!("{{\"error\":\"{e}\"}}")),
        },

        ("POST", "/action") => match serde_json::from_str::<ControlAction>(body) {
            Ok(action) => {
                let snapshot = {
                    let mut state = state.lock();
                    apply_action(&mut state, action);
                    state.clone()
                };
                let _ = action_tx.try_send(action);
                let outcome = obr_core::ActionOutcome { ok: true, state: snapshot };
                match serde_json::to_string(&outcome) {
                    Ok(body) => ("200 OK", body),
                    Err(e) => ("500 Internal Server Error", format!("{{\"error\":\"{e}\"}}")),
                }
            }
            Err(e) => ("400 Bad Request", format!("{{\"error\":\"{e}\"}}")),
        },

        _ => ("404 Not Found", "{\"error\":\"no such route\"}".to_string()),
    }
}

/// State transitions the agent applies itself; the registry mirror is
/// updated by whoever drains the action channel.
fn apply_action(state: &mut StateSnapshot, action: ControlAction) {
    match action {
        ControlAction::Release => {
            state.controlled = false;
            state.learning_active = false;
        }
        ControlAction::Ack => {
            state.ack_count += 1;
            state.incident_open = false;
            state.last_ack_at = Some(epoch_ms());
        }
        ControlAction::Refresh | ControlAction::Close => {}
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
