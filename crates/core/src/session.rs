// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent browser session records.
//!
//! A session outlives individual runs. The on-disk registry entry is the
//! single source of truth; runs reference sessions by ID and sessions
//! reference their current run by ID (no cyclic ownership).

use crate::id::WebSessionId;
use crate::run::RunId;
use serde::{Deserialize, Serialize};

/// Registry record for a persistent browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSession {
    pub session_id: WebSessionId,
    /// Browser process ID.
    pub pid: u32,
    /// Devtools websocket endpoint of the browser.
    pub cdp_endpoint: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// True while a run holds exclusive control of the page.
    #[serde(default)]
    pub controlled: bool,
    /// True while a learning window is open after a handoff.
    #[serde(default)]
    pub learning_active: bool,
    /// True while an incident is open (cleared only by ack).
    #[serde(default)]
    pub incident_open: bool,
    #[serde(default)]
    pub ack_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ack_at: Option<u64>,
    /// Epoch ms of the last successful liveness probe.
    #[serde(default)]
    pub last_seen_at: u64,
    /// Loopback port of the session's control agent.
    pub agent_port: u16,
    /// Run currently attached to this session, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_run_id: Option<RunId>,
    /// True once liveness probing found the session dead.
    #[serde(default)]
    pub closed: bool,
    pub created_at_ms: u64,
}

impl WebSession {
    pub fn new(session_id: WebSessionId, pid: u32, cdp_endpoint: String, agent_port: u16, created_at_ms: u64) -> Self {
        Self {
            session_id,
            pid,
            cdp_endpoint,
            url: String::new(),
            title: String::new(),
            controlled: false,
            learning_active: false,
            incident_open: false,
            ack_count: 0,
            last_ack_at: None,
            last_seen_at: created_at_ms,
            agent_port,
            current_run_id: None,
            closed: false,
            created_at_ms,
        }
    }

    /// Release assistant control. Does not clear an open incident.
    pub fn release(&mut self) {
        self.controlled = false;
        self.learning_active = false;
        self.current_run_id = None;
    }

    /// Record an operator ack, clearing any open incident.
    pub fn ack(&mut self, epoch_ms: u64) {
        self.ack_count += 1;
        self.last_ack_at = Some(epoch_ms);
        self.incident_open = false;
    }
}

crate::builder! {
    pub struct WebSessionBuilder => WebSession {
        into {
            cdp_endpoint: String = "ws://127.0.0.1:9222/devtools/browser/abc",
            url: String = "",
            title: String = "",
        }
        set {
            session_id: WebSessionId = WebSessionId::from("web-test0000001"),
            pid: u32 = 4242,
            controlled: bool = false,
            learning_active: bool = false,
            incident_open: bool = false,
            ack_count: u32 = 0,
            last_seen_at: u64 = 1_000_000,
            agent_port: u16 = 39_000,
            closed: bool = false,
            created_at_ms: u64 = 1_000_000,
        }
        option {
            last_ack_at: u64 = None,
            current_run_id: RunId = None,
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
