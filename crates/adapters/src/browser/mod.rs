// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser backend: launch, devtools client, page primitives, overlays.

mod cdp;
mod launch;
pub mod overlay;
mod page;

pub use cdp::{CdpClient, CdpEvent};
pub use launch::{launch_browser, pid_alive, poll_json_version, terminate_pid, BrowserHandle};
pub use page::CdpPage;

use async_trait::async_trait;
use obr_core::learning::ScrollHint;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from the browser backend.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("devtools connect failed: {0}")]
    Connect(String),
    #[error("devtools protocol error: {0}")]
    Protocol(String),
    #[error("deadline elapsed during {0}")]
    Timeout(&'static str),
    #[error("target not found: {0}")]
    TargetNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a step interacts with: a CSS selector or visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Selector(String),
    Text(String),
}

impl Target {
    pub fn describe(&self) -> String {
        match self {
            Target::Selector(s) => format!("selector:{s}"),
            Target::Text(t) => format!("text:{t}"),
        }
    }
}

/// Precheck result for a target: present ∧ visible ∧ enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applicability {
    pub present: bool,
    pub visible: bool,
    pub enabled: bool,
}

impl Applicability {
    pub fn actionable(&self) -> bool {
        self.present && self.visible && self.enabled
    }
}

/// How to perform a click.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickOptions {
    /// Animate a human-mouse trajectory before the click.
    pub human_mouse: bool,
}

/// The page primitives the engine drives.
///
/// Every call takes an explicit deadline derived from the run's
/// `Deadline` value; there are no ambient cancellation tokens.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), BrowserError>;

    /// Probe a target without interacting.
    async fn probe(&self, target: &Target, deadline: Duration) -> Result<Applicability, BrowserError>;

    /// Click a target. Returns the selector that was actually used.
    async fn click(
        &self,
        target: &Target,
        opts: ClickOptions,
        deadline: Duration,
    ) -> Result<String, BrowserError>;

    async fn fill(&self, selector: &str, value: &str, deadline: Duration) -> Result<(), BrowserError>;

    /// Select an option, preferring label match, then value.
    async fn select(&self, selector: &str, choice: &str, deadline: Duration) -> Result<(), BrowserError>;

    /// Wait until the target is visible.
    async fn wait_for(&self, target: &Target, deadline: Duration) -> Result<(), BrowserError>;

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError>;

    async fn scroll(&self, hint: &ScrollHint) -> Result<(), BrowserError>;

    async fn url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Stable signature of the current screen (heading text + landmarks)
    /// for context keys.
    async fn screen_signature(&self) -> Result<String, BrowserError>;

    /// Whether the active element currently sits inside an iframe.
    async fn focus_in_iframe(&self) -> Result<bool, BrowserError>;

    /// Force focus back to the main document (Escape + no-op focus).
    async fn escape_iframe(&self) -> Result<(), BrowserError>;

    /// Set `pointer-events: none` on the iframe holding focus.
    async fn disable_iframe_pointer_events(&self) -> Result<(), BrowserError>;

    /// Inject or update an overlay script.
    async fn install_overlay(&self, script: &str) -> Result<(), BrowserError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePage, PageCall};
