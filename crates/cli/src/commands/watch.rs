// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `obr live` / `obr watch` - follow a session in real time.
//!
//! `live` prints control-state transitions and new log lines; `watch`
//! filters log lines by level, optionally since the last position only,
//! and can raise desktop notifications on matches.

use crate::commands::web::resolve_session;
use crate::exit_error::ExitError;
use crate::EXIT_OK;
use clap::Args;
use notify::{RecursiveMode, Watcher};
use obr_adapters::control::probe_agent;
use obr_adapters::{DesktopNotifier, Notifier};
use obr_storage::{RunsRoot, SessionRegistry};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct LiveArgs {
    /// Session ID, or `last`
    #[arg(long)]
    pub attach: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Session ID, or `last`
    #[arg(long)]
    pub attach: String,
    /// Only show lines at this level or above
    #[arg(long, value_parser = ["warn", "error"])]
    pub only: Option<String>,
    /// Start from the end of the log instead of replaying it
    #[arg(long)]
    pub since_last: bool,
    /// Desktop notification per matching line
    #[arg(long)]
    pub notify: bool,
}

pub async fn live(args: LiveArgs, root: &RunsRoot) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let registry = SessionRegistry::new(root.sessions_dir());
    let id = resolve_session(&registry, &args.attach)?;
    let session = registry.load(&id)?;

    println!("live: {} (Ctrl-C to stop)", session.session_id);
    let mut last_state = String::new();
    let mut tail: Option<LogTail> = None;

    loop {
        if tokio::time::timeout(Duration::from_millis(500), tokio::signal::ctrl_c()).await.is_ok() {
            return Ok(EXIT_OK);
        }

        match probe_agent(session.agent_port).await {
            Ok(snapshot) => {
                let state = snapshot.control_state();
                let line = format!("{} {} {}", state.color, state.label, snapshot.url);
                if line != last_state {
                    println!("state: {line}");
                    last_state = line;
                }
            }
            Err(_) => {
                println!("state: agent offline");
                return Ok(EXIT_OK);
            }
        }

        // Follow the current run's log as soon as one attaches.
        let current = registry.load(&id).ok().and_then(|s| s.current_run_id);
        if let Some(run_id) = current {
            let path = root.run(&run_id).bridge_log();
            if tail.as_ref().map(|t| t.path != path).unwrap_or(true) {
                tail = LogTail::open(path, true).ok();
            }
        }
        if let Some(tail) = &mut tail {
            for line in tail.new_lines() {
                println!("log:   {line}");
            }
        }
    }
}

pub async fn watch(args: WatchArgs, root: &RunsRoot) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let registry = SessionRegistry::new(root.sessions_dir());
    let id = resolve_session(&registry, &args.attach)?;
    let session = registry.load(&id)?;

    let run_id = session
        .current_run_id
        .clone()
        .ok_or_else(|| ExitError::invalid_args("session has no attached run to watch"))?;
    let log_path = root.run(&run_id).bridge_log();

    let mut tail = LogTail::open(log_path.clone(), args.since_last)
        .map_err(|e| ExitError::invalid_args(format!("{}: {e}", log_path.display())))?;

    // File notifications when available, 1s polling as the fallback.
    let (fs_tx, fs_rx) = std::sync::mpsc::channel::<()>();
    let _watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if res.is_ok() {
            let _ = fs_tx.send(());
        }
    })
    .and_then(|mut w| w.watch(&log_path, RecursiveMode::NonRecursive).map(|()| w))
    .ok();

    let notifier = args.notify.then(DesktopNotifier::new);
    println!("watch: {} (Ctrl-C to stop)", session.session_id);

    loop {
        for line in tail.new_lines() {
            if !level_matches(&line, args.only.as_deref()) {
                continue;
            }
            println!("{line}");
            if let Some(notifier) = &notifier {
                let _ = notifier.notify("obr watch", &line).await;
            }
        }

        if tokio::time::timeout(Duration::from_millis(1_000), tokio::signal::ctrl_c()).await.is_ok()
        {
            return Ok(EXIT_OK);
        }
        // Drain coalesced fs events; the timeout above paces the loop.
        while fs_rx.try_recv().is_ok() {}
    }
}

/// Matches tracing's level tokens in formatted output.
pub(crate) fn level_matches(line: &str, only: Option<&str>) -> bool {
    match only {
        None => true,
        Some("warn") => line.contains("WARN") || line.contains("ERROR"),
        Some("error") => line.contains("ERROR"),
        Some(_) => true,
    }
}

/// Incremental reader over a growing log file.
struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    fn open(path: PathBuf, from_end: bool) -> std::io::Result<Self> {
        let offset = if from_end {
            std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        Ok(Self { path, offset })
    }

    fn new_lines(&mut self) -> Vec<String> {
        let Ok(mut file) = std::fs::File::open(&self.path) else {
            return Vec::new();
        };
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }
        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_err() {
            return Vec::new();
        }
        // Hold back a trailing partial line until its newline arrives.
        let complete = match buf.rfind('\n') {
            Some(idx) => &buf[..=idx],
            None => return Vec::new(),
        };
        self.offset += complete.len() as u64;
        complete.lines().map(str::to_string).collect()
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
