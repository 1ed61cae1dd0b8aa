// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Devtools protocol client.
//!
//! One websocket per session. Commands are id-matched to responses;
//! protocol events are forwarded on an mpsc channel stamped with nothing
//! but their method and params (the engine assigns step indices).

use super::BrowserError;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

/// A devtools protocol event (e.g. `Runtime.consoleAPICalled`).
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

/// Handle to a connected devtools websocket.
#[derive(Clone)]
pub struct CdpClient {
    out_tx: mpsc::Sender<Message>,
    pending: Pending,
    next_id: Arc<AtomicU64>,
}

impl CdpClient {
    /// Connect and start the reader task. Protocol events flow into
    /// `event_tx`; the channel is dropped when the socket closes.
    pub async fn connect(
        endpoint: &str,
        event_tx: mpsc::Sender<CdpEvent>,
        deadline: Duration,
    ) -> Result<Self, BrowserError> {
        let (ws, _) = tokio::time::timeout(deadline, tokio_tungstenite::connect_async(endpoint))
            .await
            .map_err(|_| BrowserError::Timeout("devtools connect"))?
            .map_err(|e| BrowserError::Connect(e.to_string()))?;

        let (mut write, mut read) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => {
                        match outgoing {
                            Some(msg) => {
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                dispatch(&reader_pending, &event_tx, &text).await;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "devtools socket error");
                                break;
                            }
                            _ => {} // Ping/Pong/Binary
                        }
                    }
                }
            }
            // Fail anything still waiting so callers see Connect, not a hang.
            let mut pending = reader_pending.lock();
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err("devtools socket closed".to_string()));
            }
        });

        Ok(Self { out_tx, pending, next_id: Arc::new(AtomicU64::new(1)) })
    }

    /// Issue a command and await its response within the deadline.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = json!({ "id": id, "method": method, "params": params }).to_string();
        self.out_tx
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| BrowserError::Connect("devtools socket closed".to_string()))?;

        let result = tokio::time::timeout(deadline, rx).await;
        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(BrowserError::Protocol(e)),
            Ok(Err(_)) => Err(BrowserError::Connect("devtools socket closed".to_string())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(BrowserError::Timeout("devtools call"))
            }
        }
    }
}

async fn dispatch(pending: &Pending, event_tx: &mpsc::Sender<CdpEvent>, text: &str) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return;
    };
    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        let reply = if let Some(error) = value.get("error") {
            Err(error.to_string())
        } else {
            Ok(value.get("result").cloned().unwrap_or(Value::Null))
        };
        if let Some(tx) = pending.lock().remove(&id) {
            let _ = tx.send(reply);
        }
        return;
    }
    if let Some(method) = value.get("method").and_then(Value::as_str) {
        let event = CdpEvent {
            method: method.to_string(),
            params: value.get("params").cloned().unwrap_or(Value::Null),
        };
        let _ = event_tx.send(event).await;
    }
}
