// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session control agent: a loopback HTTP server owned by the
//! session (not the run) plus the client used to probe it.
//!
//! Wire format is plain HTTP/1.1 with JSON bodies, hand-framed with
//! Content-Length reads. Three routes do not justify an HTTP dependency.

mod client;
mod server;

pub use client::{agent_get, agent_post, probe_agent, send_action, send_event};
pub use server::{ControlAgent, ControlAgentHandle};

use thiserror::Error;

/// Errors from the control agent and its client.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("agent offline")]
    Offline,
}
