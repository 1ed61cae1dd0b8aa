// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! obr-engine: the deterministic, evidence-producing step runner.
//!
//! Drives a browser through a frozen plan, classifies per-step outcomes,
//! detects stuck conditions via a watchdog, hands control to a human with
//! persistent learning of successful selectors, and guarantees run
//! finalisation: no run stays `running`.

mod deadline;
mod finalize;
mod handoff;
mod modes;
mod observers;
mod runner;
mod session;

pub use deadline::Deadline;
pub use finalize::{finalize_run, FinalizeInput};
pub use modes::run_narrative_mode;
pub use observers::ObserverSource;
pub use runner::{RunSummary, WebRunDeps, WebRunner};
pub use session::{attach_session, close_session, open_session, probe_liveness, release_session, AttachedSession, OpenSession};

use thiserror::Error;

/// Errors fatal to a run (step-scoped failures become step outcomes,
/// not errors).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("session {0} is not attachable")]
    SessionDead(String),
    #[error("storage error: {0}")]
    Storage(#[from] obr_storage::StorageError),
    #[error("browser error: {0}")]
    Browser(#[from] obr_adapters::BrowserError),
    #[error("control agent error: {0}")]
    Control(#[from] obr_adapters::ControlError),
}
