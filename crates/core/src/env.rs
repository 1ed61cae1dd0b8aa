// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! Every tunable the bridge reads from the environment lives here, as a
//! typed accessor with a default and (where the variable is a deadline)
//! a clamp. Nothing else in the workspace calls `std::env::var` for
//! configuration.

use crate::run::NoiseMode;
use std::time::Duration;

fn parse_secs(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

/// Operator-agent binary name (default: `interpreter`).
pub fn oi_command() -> String {
    std::env::var("OI_BRIDGE_COMMAND").unwrap_or_else(|_| "interpreter".to_string())
}

/// Extra arguments passed to the operator agent, whitespace-separated.
pub fn oi_args() -> Vec<String> {
    std::env::var("OI_BRIDGE_ARGS")
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Overall operator-agent subprocess budget (default: 300s).
pub fn oi_timeout() -> Duration {
    Duration::from_secs(parse_secs("OI_BRIDGE_TIMEOUT_SECONDS").unwrap_or(300))
}

/// Per-interaction browser deadline (default: 8s, clamped to 1–60).
pub fn interactive_timeout() -> Duration {
    let secs = parse_secs("BRIDGE_WEB_INTERACTIVE_TIMEOUT_SECONDS").unwrap_or(8);
    Duration::from_secs(secs.clamp(1, 60))
}

/// Hard per-step deadline (default: 20s).
pub fn step_hard_timeout() -> Duration {
    Duration::from_secs(parse_secs("BRIDGE_WEB_STEP_HARD_TIMEOUT_SECONDS").unwrap_or(20))
}

/// Hard per-run deadline (default: 120s).
pub fn run_hard_timeout() -> Duration {
    Duration::from_secs(parse_secs("BRIDGE_WEB_RUN_HARD_TIMEOUT_SECONDS").unwrap_or(120))
}

/// How long a learning window stays open after a handoff (default: 25s).
pub fn learning_window() -> Duration {
    Duration::from_secs(parse_secs("BRIDGE_LEARNING_WINDOW_SECONDS").unwrap_or(25))
}

/// Observer noise mode (default: minimal).
pub fn observer_noise_mode() -> NoiseMode {
    match std::env::var("BRIDGE_OBSERVER_NOISE_MODE").as_deref() {
        Ok("debug") => NoiseMode::Debug,
        _ => NoiseMode::Minimal,
    }
}

/// Whether the cloud reasoning backend is configured.
pub fn has_api_key() -> bool {
    std::env::var("OPENAI_API_KEY").map(|v| !v.is_empty()).unwrap_or(false)
}

/// X11 display, required for GUI mode.
pub fn display() -> Option<String> {
    std::env::var("DISPLAY").ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
