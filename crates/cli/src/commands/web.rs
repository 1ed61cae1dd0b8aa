// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `obr web-open` / `web-release` / `web-close` - session management.

use crate::exit_error::ExitError;
use crate::output::OutputFormat;
use crate::EXIT_OK;
use clap::Args;
use obr_core::{SystemClock, WebSessionId};
use obr_engine::{close_session, open_session, release_session};
use obr_storage::{RunsRoot, SessionRegistry};

#[derive(Args)]
pub struct WebOpenArgs {
    /// Navigate to this URL after opening
    #[arg(long)]
    pub url: Option<String>,
    /// Run the browser headless (default is headed for open sessions)
    #[arg(long)]
    pub headless: bool,
}

#[derive(Args)]
pub struct AttachArgs {
    /// Session ID, or `last`
    #[arg(long)]
    pub attach: String,
}

/// Resolve `--attach <id|last>` against the registry.
pub fn resolve_session(registry: &SessionRegistry, attach: &str) -> Result<WebSessionId, ExitError> {
    if attach == "last" {
        return registry
            .last()?
            .map(|s| s.session_id)
            .ok_or_else(|| ExitError::invalid_args("no live sessions"));
    }
    Ok(WebSessionId::from_string(attach))
}

pub async fn open(args: WebOpenArgs, root: &RunsRoot, format: OutputFormat) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let registry = SessionRegistry::new(root.sessions_dir());
    let opened = open_session(
        &registry,
        &root.sessions_dir(),
        args.url.as_deref(),
        !args.headless,
        &SystemClock,
    )
    .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&opened.session).unwrap_or_default())
        }
        OutputFormat::Text => {
            println!("session: {}", opened.session.session_id);
            println!("url:     {}", opened.session.url);
            println!("agent:   127.0.0.1:{}", opened.session.agent_port);
            println!("Keep this process running; the control agent lives here.");
            println!("Press Ctrl-C to close the session.");
        }
    }

    // The session host: the control agent serves until interrupted.
    let session_id = opened.session.session_id.clone();
    let _agent = opened.agent;
    let _ = tokio::signal::ctrl_c().await;
    let _ = close_session(&registry, &session_id);
    Ok(EXIT_OK)
}

pub async fn release(args: AttachArgs, root: &RunsRoot, format: OutputFormat) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let registry = SessionRegistry::new(root.sessions_dir());
    let id = resolve_session(&registry, &args.attach)?;
    let session = release_session(&registry, &id)?;

    // Best effort: tell the session's agent so the bar updates within a
    // poll cycle.
    let _ = obr_adapters::control::send_action(session.agent_port, obr_core::ControlAction::Release)
        .await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session).unwrap_or_default()),
        OutputFormat::Text => println!("released {}", session.session_id),
    }
    Ok(EXIT_OK)
}

pub async fn close(args: AttachArgs, root: &RunsRoot, format: OutputFormat) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let registry = SessionRegistry::new(root.sessions_dir());
    let id = resolve_session(&registry, &args.attach)?;
    let session = close_session(&registry, &id)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session).unwrap_or_default()),
        OutputFormat::Text => println!("closed {}", session.session_id),
    }
    Ok(EXIT_OK)
}

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;
