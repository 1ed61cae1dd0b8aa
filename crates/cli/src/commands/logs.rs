// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `obr logs` - tail the most recent run's bridge log.

use crate::exit_error::ExitError;
use crate::EXIT_OK;
use clap::Args;
use obr_storage::{RunsRoot, StatusIndex};

#[derive(Args)]
pub struct LogsArgs {
    /// Number of trailing lines
    #[arg(long, default_value_t = 50)]
    pub tail: usize,
    /// Run ID (default: most recently updated run)
    #[arg(long)]
    pub run: Option<String>,
}

pub fn handle(args: LogsArgs, root: &RunsRoot) -> Result<i32, ExitError> {
    let status = StatusIndex::new(root.status_file());
    let run_id = match args.run {
        Some(id) => obr_core::RunId::from_string(id),
        None => {
            let mut runs = status.all()?;
            runs.sort_by_key(|(_, e)| e.updated_at_ms);
            runs.pop()
                .map(|(id, _)| id)
                .ok_or_else(|| ExitError::invalid_args("no runs recorded"))?
        }
    };

    let log_path = root.run(&run_id).bridge_log();
    let content = std::fs::read_to_string(&log_path)
        .map_err(|e| ExitError::invalid_args(format!("{}: {e}", log_path.display())))?;

    for line in tail_lines(&content, args.tail) {
        println!("{line}");
    }
    Ok(EXIT_OK)
}

pub(crate) fn tail_lines(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
