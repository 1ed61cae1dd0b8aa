// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer event intake.
//!
//! In-process runs drain the control agent's channel directly; attached
//! runs poll the session's agent over HTTP. Either way the engine stamps
//! events with the current step index at receipt.

use obr_adapters::control::agent_get;
use obr_core::ObserverEvent;
use std::time::Duration;
use tokio::sync::mpsc;

/// Where observer events come from.
pub enum ObserverSource {
    /// Same-process channel from the control agent.
    Channel(mpsc::Receiver<ObserverEvent>),
    /// Cross-process polling of `GET /events?since=N`.
    Poll { port: u16, cursor: u64, pending: Vec<ObserverEvent> },
}

impl ObserverSource {
    pub fn channel(rx: mpsc::Receiver<ObserverEvent>) -> Self {
        ObserverSource::Channel(rx)
    }

    pub fn polling(port: u16) -> Self {
        ObserverSource::Poll { port, cursor: 0, pending: Vec::new() }
    }

    /// Next event, or `None` once `budget` elapses with nothing new.
    pub async fn next(&mut self, budget: Duration) -> Option<ObserverEvent> {
        match self {
            ObserverSource::Channel(rx) => {
                tokio::time::timeout(budget, rx.recv()).await.ok().flatten()
            }
            ObserverSource::Poll { port, cursor, pending } => {
                if !pending.is_empty() {
                    return Some(pending.remove(0));
                }
                let deadline = tokio::time::Instant::now() + budget;
                loop {
                    if let Ok(body) = agent_get(*port, &format!("/events?since={cursor}")).await {
                        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
                            if let Some(next) = value.get("next").and_then(|v| v.as_u64()) {
                                *cursor = next;
                            }
                            if let Some(events) = value.get("events") {
                                if let Ok(mut events) =
                                    serde_json::from_value::<Vec<ObserverEvent>>(events.clone())
                                {
                                    if !events.is_empty() {
                                        let first = events.remove(0);
                                        pending.extend(events);
                                        return Some(first);
                                    }
                                }
                            }
                        }
                    }
                    if tokio::time::Instant::now() + Duration::from_millis(250) >= deadline {
                        return None;
                    }
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
        }
    }

    /// Drain whatever is immediately available.
    pub async fn drain(&mut self) -> Vec<ObserverEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next(Duration::from_millis(1)).await {
            events.push(event);
            if events.len() >= 64 {
                break;
            }
        }
        events
    }
}

#[cfg(test)]
#[path = "observers_tests.rs"]
mod tests;
