// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrative operator-agent subprocess.
//!
//! Its stdout/stderr are a lossy channel: line-oriented heuristics
//! extract at most observation and finding hints. Actions and evidence
//! paths are authored by the engine alone and never taken from here.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Errors from the operator-agent subprocess.
#[derive(Debug, Error)]
pub enum OiError {
    #[error("spawn failed for `{command}`: {source}")]
    Spawn { command: String, source: std::io::Error },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operator agent exceeded its {0:?} budget")]
    Timeout(Duration),
}

/// Subprocess configuration.
#[derive(Debug, Clone)]
pub struct OiConfig {
    pub command: String,
    pub args: Vec<String>,
    pub task: String,
    /// Scoped writable home (`<run_dir>/.oi_home`).
    pub home: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    pub timeout: Duration,
}

impl OiConfig {
    /// Build from the environment plus run paths.
    pub fn from_env(task: &str, home: PathBuf, stdout_log: PathBuf, stderr_log: PathBuf) -> Self {
        Self {
            command: obr_core::env::oi_command(),
            args: obr_core::env::oi_args(),
            task: task.to_string(),
            home,
            stdout_log,
            stderr_log,
            timeout: obr_core::env::oi_timeout(),
        }
    }
}

/// Hints extracted from narrative output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrativeHints {
    pub observations: Vec<String>,
    pub ui_findings: Vec<String>,
}

impl NarrativeHints {
    /// Line-oriented extraction. Prefixed lines are taken verbatim;
    /// error-looking lines become findings; everything else is dropped.
    pub fn extract_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        let lower = trimmed.to_lowercase();
        if let Some(rest) = strip_prefix_ci(trimmed, "observation:") {
            push_unique(&mut self.observations, rest.trim());
        } else if let Some(rest) = strip_prefix_ci(trimmed, "finding:") {
            push_unique(&mut self.ui_findings, rest.trim());
        } else if lower.starts_with("error") || lower.starts_with("failed") || lower.contains("traceback") {
            push_unique(&mut self.ui_findings, trimmed);
        }
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn push_unique(list: &mut Vec<String>, entry: &str) {
    if !entry.is_empty() && !list.iter().any(|e| e == entry) {
        list.push(entry.to_string());
    }
}

pub struct NarrativeExecutor;

impl NarrativeExecutor {
    /// Run the operator agent to completion (or its budget), teeing
    /// stdout/stderr to the run's log files and extracting hints.
    pub async fn run(config: &OiConfig) -> Result<NarrativeHints, OiError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .arg(&config.task)
            .env("HOME", &config.home)
            .env("XDG_CACHE_HOME", config.home.join(".cache"))
            .env("XDG_CONFIG_HOME", config.home.join(".config"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OiError::Spawn { command: config.command.clone(), source })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = tee_lines(stdout, config.stdout_log.clone(), true);
        let stderr_task = tee_lines(stderr, config.stderr_log.clone(), false);

        let run = async {
            let (out_hints, err_hints) = tokio::join!(stdout_task, stderr_task);
            let status = child.wait().await?;
            tracing::info!(code = status.code(), "operator agent exited");
            let mut hints = out_hints?;
            let err_hints = err_hints?;
            for finding in err_hints.ui_findings {
                push_unique(&mut hints.ui_findings, &finding);
            }
            Ok::<NarrativeHints, OiError>(hints)
        };

        match tokio::time::timeout(config.timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                let _ = child.kill().await;
                Err(OiError::Timeout(config.timeout))
            }
        }
    }
}

/// Stream lines to a log file while feeding the hint extractor.
/// `use_observations` is false for stderr, which only ever yields findings.
async fn tee_lines(
    pipe: Option<impl tokio::io::AsyncRead + Unpin>,
    log_path: impl AsRef<Path>,
    use_observations: bool,
) -> Result<NarrativeHints, OiError> {
    let mut hints = NarrativeHints::default();
    let Some(pipe) = pipe else {
        return Ok(hints);
    };
    let mut log = tokio::fs::File::create(log_path.as_ref()).await?;
    let mut lines = BufReader::new(pipe).lines();
    while let Some(line) = lines.next_line().await? {
        log.write_all(line.as_bytes()).await?;
        log.write_all(b"\n").await?;
        hints.extract_line(&line);
    }
    log.flush().await?;
    if !use_observations {
        hints.observations.clear();
    }
    Ok(hints)
}

#[cfg(test)]
#[path = "oi_tests.rs"]
mod tests;
