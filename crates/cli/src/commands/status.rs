// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `obr status` - runs and sessions at a glance.
//!
//! Session liveness is recomputed before reporting; a dead session is
//! marked closed here rather than shown as live.

use crate::exit_error::ExitError;
use crate::output::{format_time_ago, OutputFormat};
use crate::EXIT_OK;
use obr_core::{Clock, ControlColor, SystemClock};
use obr_engine::probe_liveness;
use obr_storage::{RunsRoot, SessionRegistry, StatusIndex};

pub async fn handle(root: &RunsRoot, format: OutputFormat) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let clock = SystemClock;
    let status = StatusIndex::new(root.status_file());
    let registry = SessionRegistry::new(root.sessions_dir());

    let mut runs = status.all()?;
    runs.sort_by_key(|(_, e)| std::cmp::Reverse(e.updated_at_ms));

    let mut sessions = registry.list()?;
    for session in &mut sessions {
        if session.closed {
            continue;
        }
        if probe_liveness(session).await {
            *session = registry.update(&session.session_id, |s| {
                s.last_seen_at = clock.epoch_ms();
            })?;
        } else {
            *session = registry.update(&session.session_id, |s| s.closed = true)?;
        }
    }

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "runs": runs
                .iter()
                .map(|(id, e)| serde_json::json!({
                    "run_id": id.as_str(),
                    "status": e.status,
                    "result": e.result,
                    "mode": e.mode,
                    "updated_at_ms": e.updated_at_ms,
                }))
                .collect::<Vec<_>>(),
            "sessions": sessions,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return Ok(EXIT_OK);
    }

    if runs.is_empty() {
        println!("No runs");
    } else {
        let id_width = runs.iter().map(|(id, _)| id.as_str().len()).max().unwrap_or(0).max("RUN".len());
        println!("{:<id_width$} {:<9} {:<7} {:<5} UPDATED", "RUN", "STATUS", "RESULT", "MODE");
        let now = clock.epoch_ms();
        for (id, entry) in &runs {
            println!(
                "{:<id_width$} {:<9} {:<7} {:<5} {}",
                id.as_str(),
                entry.status.to_string(),
                entry.result.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                entry.mode.to_string(),
                format_time_ago(entry.updated_at_ms, now),
            );
        }
    }

    println!();
    if sessions.is_empty() {
        println!("No sessions");
    } else {
        println!("{:<24} {:<7} {:<6} STATE", "SESSION", "PID", "PORT");
        for session in &sessions {
            let color = if session.closed {
                ControlColor::Gray
            } else {
                ControlColor::derive(
                    session.controlled,
                    session.learning_active,
                    session.incident_open,
                    true,
                )
            };
            println!(
                "{:<24} {:<7} {:<6} {}",
                session.session_id.as_str(),
                session.pid,
                session.agent_port,
                color,
            );
        }
    }

    Ok(EXIT_OK)
}
