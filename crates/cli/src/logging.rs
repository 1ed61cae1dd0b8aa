// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup.
//!
//! Run commands log to `runs/<run_id>/bridge.log` through a non-blocking
//! appender; diagnostic commands log to stderr only. `RUST_LOG` narrows
//! both.

use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the per-run file logger. The returned guard must live for the
/// duration of the run so buffered lines are flushed.
pub fn init_run_logging(run_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let appender = tracing_appender::rolling::never(run_dir, "bridge.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .try_init();
    if result.is_err() {
        // A subscriber is already installed (tests); keep the guard anyway.
        tracing::debug!("run logging: subscriber already installed");
    }
    Some(guard)
}

/// Stderr-only logging for diagnostic commands.
pub fn init_diagnostic_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .try_init();
}
