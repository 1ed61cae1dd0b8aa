// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable fake page driver for engine tests.

use super::{Applicability, BrowserError, ClickOptions, PageDriver, Target};
use async_trait::async_trait;
use obr_core::learning::ScrollHint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    Navigate(String),
    Probe(String),
    Click(String),
    Fill(String, String),
    Select(String, String),
    WaitFor(String),
    Screenshot(String),
    Scroll(String, i64),
    EscapeIframe,
    DisablePointerEvents,
    InstallOverlay,
}

#[derive(Default)]
struct FakePageState {
    calls: Vec<PageCall>,
    /// Targets (by describe()) that probe as actionable.
    actionable: HashMap<String, Applicability>,
    /// Targets whose click fails with TargetNotFound.
    unclickable: Vec<String>,
    /// Targets whose click times out.
    hanging: Vec<String>,
    url: String,
    title: String,
    signature: String,
    focus_in_iframe: bool,
    screenshot_fails: bool,
}

/// Fake page driver; every interaction is recorded, outcomes are
/// scripted per target.
#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakePageState>>,
}

impl FakePage {
    pub fn new() -> Self {
        let page = Self::default();
        {
            let mut state = page.state.lock();
            state.url = "http://localhost:5173/".to_string();
            state.title = "App".to_string();
            state.signature = "catalog".to_string();
        }
        page
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.state.lock().calls.clone()
    }

    /// Script a target as present, visible, and enabled.
    pub fn make_actionable(&self, target: &Target) {
        self.state.lock().actionable.insert(
            target.describe(),
            Applicability { present: true, visible: true, enabled: true },
        );
    }

    pub fn set_applicability(&self, target: &Target, app: Applicability) {
        self.state.lock().actionable.insert(target.describe(), app);
    }

    /// Script a target to fail clicks with TargetNotFound.
    pub fn make_unclickable(&self, target: &Target) {
        self.state.lock().unclickable.push(target.describe());
    }

    /// Script a target to hang until the deadline.
    pub fn make_hanging(&self, target: &Target) {
        self.state.lock().hanging.push(target.describe());
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().url = url.to_string();
    }

    pub fn set_signature(&self, signature: &str) {
        self.state.lock().signature = signature.to_string();
    }

    pub fn set_focus_in_iframe(&self, stuck: bool) {
        self.state.lock().focus_in_iframe = stuck;
    }

    pub fn fail_screenshots(&self) {
        self.state.lock().screenshot_fails = true;
    }

    fn record(&self, call: PageCall) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str, _deadline: Duration) -> Result<(), BrowserError> {
        self.record(PageCall::Navigate(url.to_string()));
        self.state.lock().url = url.to_string();
        Ok(())
    }

    async fn probe(&self, target: &Target, _deadline: Duration) -> Result<Applicability, BrowserError> {
        self.record(PageCall::Probe(target.describe()));
        Ok(self.state.lock().actionable.get(&target.describe()).copied().unwrap_or_default())
    }

    async fn click(
        &self,
        target: &Target,
        _opts: ClickOptions,
        deadline: Duration,
    ) -> Result<String, BrowserError> {
        self.record(PageCall::Click(target.describe()));
        let (unclickable, hanging) = {
            let state = self.state.lock();
            (
                state.unclickable.contains(&target.describe()),
                state.hanging.contains(&target.describe()),
            )
        };
        if hanging {
            tokio::time::sleep(deadline).await;
            return Err(BrowserError::Timeout("click"));
        }
        if unclickable {
            return Err(BrowserError::TargetNotFound(target.describe()));
        }
        Ok(match target {
            Target::Selector(s) => s.clone(),
            Target::Text(t) => format!("[data-text=\"{t}\"]"),
        })
    }

    async fn fill(&self, selector: &str, value: &str, _deadline: Duration) -> Result<(), BrowserError> {
        self.record(PageCall::Fill(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select(&self, selector: &str, choice: &str, _deadline: Duration) -> Result<(), BrowserError> {
        self.record(PageCall::Select(selector.to_string(), choice.to_string()));
        Ok(())
    }

    async fn wait_for(&self, target: &Target, deadline: Duration) -> Result<(), BrowserError> {
        self.record(PageCall::WaitFor(target.describe()));
        let app = self.state.lock().actionable.get(&target.describe()).copied().unwrap_or_default();
        if app.present && app.visible {
            Ok(())
        } else {
            tokio::time::sleep(deadline.min(Duration::from_millis(20))).await;
            Err(BrowserError::Timeout("wait"))
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.record(PageCall::Screenshot(path.display().to_string()));
        if self.state.lock().screenshot_fails {
            return Err(BrowserError::Protocol("screenshot scripted to fail".to_string()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"fake-png")?;
        Ok(())
    }

    async fn scroll(&self, hint: &ScrollHint) -> Result<(), BrowserError> {
        self.record(PageCall::Scroll(hint.container.clone(), hint.top));
        Ok(())
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().url.clone())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().title.clone())
    }

    async fn screen_signature(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().signature.clone())
    }

    async fn focus_in_iframe(&self) -> Result<bool, BrowserError> {
        Ok(self.state.lock().focus_in_iframe)
    }

    async fn escape_iframe(&self) -> Result<(), BrowserError> {
        self.record(PageCall::EscapeIframe);
        Ok(())
    }

    async fn disable_iframe_pointer_events(&self) -> Result<(), BrowserError> {
        self.record(PageCall::DisablePointerEvents);
        Ok(())
    }

    async fn install_overlay(&self, _script: &str) -> Result<(), BrowserError> {
        self.record(PageCall::InstallOverlay);
        Ok(())
    }
}
