// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! obr-adapters: execution backends for the bridge.
//!
//! - `browser`: chromium launch, devtools websocket client, page
//!   primitives, and the injected overlay scripts
//! - `control`: the per-session loopback control agent (HTTP server and
//!   client)
//! - `oi`: the narrative operator-agent subprocess
//! - `notify`: desktop notifications

pub mod browser;
pub mod control;
pub mod notify;
pub mod oi;

pub use browser::{
    launch_browser, Applicability, BrowserError, BrowserHandle, CdpClient, CdpEvent, CdpPage,
    ClickOptions, PageDriver, Target,
};
#[cfg(any(test, feature = "test-support"))]
pub use browser::{FakePage, PageCall};
pub use control::{
    agent_get, agent_post, probe_agent, send_action, send_event, ControlAgent, ControlAgentHandle,
    ControlError,
};
pub use notify::{DesktopNotifier, Notifier, NotifyError};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifier, NotifyCall};
pub use oi::{NarrativeExecutor, NarrativeHints, OiConfig, OiError};
