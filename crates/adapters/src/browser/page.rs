// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Page primitives over the devtools client.
//!
//! Interaction goes through `Runtime.evaluate` (element-relative, so the
//! coordinate-click guardrail has nothing to block here) except the
//! human-mouse trajectory, which uses `Input.dispatchMouseEvent`.

use super::cdp::CdpClient;
use super::{Applicability, BrowserError, ClickOptions, PageDriver, Target};
use async_trait::async_trait;
use base64::Engine;
use obr_core::learning::ScrollHint;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// JS helpers shared by the find/probe snippets. `__obrFind` resolves a
/// selector or visible text to an element and a stable selector for it;
/// `<option>` elements and hidden matches rank last so `wait text` does
/// not latch onto collapsed dropdown entries.
const FIND_HELPER: &str = r#"
function __obrVisible(el) {
  const r = el.getBoundingClientRect();
  const s = window.getComputedStyle(el);
  return r.width > 0 && r.height > 0 && s.display !== 'none' && s.visibility !== 'hidden';
}
function __obrSelectorFor(el) {
  if (el.id) return '#' + CSS.escape(el.id);
  if (el.dataset && el.dataset.testid) return '[data-testid="' + el.dataset.testid + '"]';
  const parts = [];
  let node = el;
  while (node && node.nodeType === 1 && parts.length < 5) {
    let part = node.tagName.toLowerCase();
    const parent = node.parentElement;
    if (parent) {
      const siblings = Array.from(parent.children).filter(c => c.tagName === node.tagName);
      if (siblings.length > 1) part += ':nth-of-type(' + (siblings.indexOf(node) + 1) + ')';
    }
    parts.unshift(part);
    node = parent;
  }
  return parts.join(' > ');
}
function __obrFind(spec) {
  if (spec.selector) {
    const el = document.querySelector(spec.selector);
    return el ? { el, selector: spec.selector } : null;
  }
  const needle = spec.text.trim();
  const nodes = Array.from(document.querySelectorAll(
    'button, a, [role="button"], input[type="submit"], input[type="button"], label, summary, [onclick], li, span'));
  const matches = nodes.filter(el =>
    el.tagName !== 'OPTION' && (el.textContent || '').trim().includes(needle));
  matches.sort((a, b) => __obrVisible(b) - __obrVisible(a));
  const el = matches[0];
  return el ? { el, selector: __obrSelectorFor(el) } : null;
}
"#;

/// A page bound to one devtools connection.
pub struct CdpPage {
    client: CdpClient,
}

impl CdpPage {
    pub fn new(client: CdpClient) -> Self {
        Self { client }
    }

    /// Enable the domains the engine listens on.
    pub async fn enable_domains(&self, deadline: Duration) -> Result<(), BrowserError> {
        for method in ["Page.enable", "Runtime.enable", "Network.enable"] {
            self.client.call(method, json!({}), deadline).await?;
        }
        Ok(())
    }

    /// Evaluate an expression and return its JSON value.
    async fn eval(&self, expression: &str, deadline: Duration) -> Result<Value, BrowserError> {
        let result = self
            .client
            .call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true, "awaitPromise": true }),
                deadline,
            )
            .await?;
        if let Some(desc) = result.pointer("/exceptionDetails/exception/description") {
            return Err(BrowserError::Protocol(desc.to_string()));
        }
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    fn spec_json(target: &Target) -> String {
        match target {
            Target::Selector(s) => json!({ "selector": s }).to_string(),
            Target::Text(t) => json!({ "text": t }).to_string(),
        }
    }

    async fn element_center(
        &self,
        target: &Target,
        deadline: Duration,
    ) -> Result<(f64, f64), BrowserError> {
        let script = format!(
            "(() => {{ {FIND_HELPER} const hit = __obrFind({spec}); if (!hit) return null; \
             hit.el.scrollIntoView({{block: 'center'}}); const r = hit.el.getBoundingClientRect(); \
             return {{ x: r.x + r.width / 2, y: r.y + r.height / 2 }}; }})()",
            spec = Self::spec_json(target),
        );
        let value = self.eval(&script, deadline).await?;
        let x = value.pointer("/x").and_then(Value::as_f64);
        let y = value.pointer("/y").and_then(Value::as_f64);
        match (x, y) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(BrowserError::TargetNotFound(target.describe())),
        }
    }

    /// Interpolated mousemove steps, a hold, then release: the visual
    /// human-mouse trajectory.
    async fn human_mouse_click(&self, x: f64, y: f64, deadline: Duration) -> Result<(), BrowserError> {
        const STEPS: u32 = 12;
        for i in 1..=STEPS {
            let t = f64::from(i) / f64::from(STEPS);
            self.client
                .call(
                    "Input.dispatchMouseEvent",
                    json!({ "type": "mouseMoved", "x": x * t, "y": y * t }),
                    deadline,
                )
                .await?;
            tokio::time::sleep(Duration::from_millis(12)).await;
        }
        self.client
            .call(
                "Input.dispatchMouseEvent",
                json!({ "type": "mousePressed", "x": x, "y": y, "button": "left", "clickCount": 1 }),
                deadline,
            )
            .await?;
        tokio::time::sleep(Duration::from_millis(60)).await;
        self.client
            .call(
                "Input.dispatchMouseEvent",
                json!({ "type": "mouseReleased", "x": x, "y": y, "button": "left", "clickCount": 1 }),
                deadline,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), BrowserError> {
        self.client.call("Page.navigate", json!({ "url": url }), deadline).await?;
        // Wait for the document to settle.
        let poll = async {
            loop {
                let state = self
                    .eval("document.readyState", Duration::from_secs(2))
                    .await
                    .unwrap_or(Value::Null);
                if state.as_str() == Some("complete") || state.as_str() == Some("interactive") {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| BrowserError::Timeout("navigate"))
    }

    async fn probe(&self, target: &Target, deadline: Duration) -> Result<Applicability, BrowserError> {
        let script = format!(
            "(() => {{ {FIND_HELPER} const hit = __obrFind({spec}); \
             if (!hit) return {{ present: false, visible: false, enabled: false }}; \
             return {{ present: true, visible: __obrVisible(hit.el), enabled: !hit.el.disabled }}; }})()",
            spec = Self::spec_json(target),
        );
        let value = self.eval(&script, deadline).await?;
        Ok(Applicability {
            present: value.pointer("/present").and_then(Value::as_bool).unwrap_or(false),
            visible: value.pointer("/visible").and_then(Value::as_bool).unwrap_or(false),
            enabled: value.pointer("/enabled").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    async fn click(
        &self,
        target: &Target,
        opts: ClickOptions,
        deadline: Duration,
    ) -> Result<String, BrowserError> {
        if opts.human_mouse {
            let (x, y) = self.element_center(target, deadline).await?;
            self.human_mouse_click(x, y, deadline).await?;
            // Selector reported for learning even on trajectory clicks.
            let script = format!(
                "(() => {{ {FIND_HELPER} const hit = __obrFind({spec}); return hit ? hit.selector : null; }})()",
                spec = Self::spec_json(target),
            );
            let value = self.eval(&script, deadline).await?;
            return value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| BrowserError::TargetNotFound(target.describe()));
        }

        let script = format!(
            "(() => {{ {FIND_HELPER} const hit = __obrFind({spec}); if (!hit) return null; \
             hit.el.scrollIntoView({{block: 'center'}}); hit.el.click(); return hit.selector; }})()",
            spec = Self::spec_json(target),
        );
        let value = self.eval(&script, deadline).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::TargetNotFound(target.describe()))
    }

    async fn fill(&self, selector: &str, value: &str, deadline: Duration) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
             el.focus(); el.value = {val}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
            sel = json!(selector),
            val = json!(value),
        );
        match self.eval(&script, deadline).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::TargetNotFound(format!("selector:{selector}"))),
        }
    }

    async fn select(&self, selector: &str, choice: &str, deadline: Duration) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el || !el.options) return false; \
             const byLabel = Array.from(el.options).find(o => o.label.trim() === {choice} || o.textContent.trim() === {choice}); \
             const byValue = Array.from(el.options).find(o => o.value === {choice}); \
             const opt = byLabel || byValue; if (!opt) return false; \
             el.value = opt.value; el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
            sel = json!(selector),
            choice = json!(choice),
        );
        match self.eval(&script, deadline).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::TargetNotFound(format!("selector:{selector} choice:{choice}"))),
        }
    }

    async fn wait_for(&self, target: &Target, deadline: Duration) -> Result<(), BrowserError> {
        let poll = async {
            loop {
                if let Ok(app) = self.probe(target, Duration::from_secs(2)).await {
                    if app.present && app.visible {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| BrowserError::Timeout("wait"))
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let result = self
            .client
            .call("Page.captureScreenshot", json!({ "format": "png" }), Duration::from_secs(10))
            .await?;
        let data = result
            .pointer("/data")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("captureScreenshot returned no data".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| BrowserError::Protocol(format!("screenshot decode: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    async fn scroll(&self, hint: &ScrollHint) -> Result<(), BrowserError> {
        let script = if hint.container.is_empty() {
            format!("window.scrollTo(0, {})", hint.top)
        } else {
            format!(
                "(() => {{ const el = document.querySelector({sel}); if (el) el.scrollTop = {top}; }})()",
                sel = json!(hint.container),
                top = hint.top,
            )
        };
        self.eval(&script, Duration::from_secs(2)).await?;
        Ok(())
    }

    async fn url(&self) -> Result<String, BrowserError> {
        let value = self.eval("window.location.href", Duration::from_secs(2)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let value = self.eval("document.title", Duration::from_secs(2)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screen_signature(&self) -> Result<String, BrowserError> {
        let script = "(() => { \
            const heads = Array.from(document.querySelectorAll('h1, h2')).map(h => h.textContent.trim()).slice(0, 4); \
            const landmarks = Array.from(document.querySelectorAll('main, nav, [role=\"main\"], [role=\"navigation\"]')).map(l => l.tagName.toLowerCase()); \
            return heads.concat(landmarks).join('|'); })()";
        let value = self.eval(script, Duration::from_secs(2)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn focus_in_iframe(&self) -> Result<bool, BrowserError> {
        let value = self
            .eval(
                "document.activeElement && document.activeElement.tagName === 'IFRAME'",
                Duration::from_secs(2),
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn escape_iframe(&self) -> Result<(), BrowserError> {
        for kind in ["keyDown", "keyUp"] {
            self.client
                .call(
                    "Input.dispatchKeyEvent",
                    json!({ "type": kind, "key": "Escape", "code": "Escape" }),
                    Duration::from_secs(2),
                )
                .await?;
        }
        self.eval(
            "(() => { if (document.activeElement) document.activeElement.blur(); \
             document.body.focus(); window.focus(); })()",
            Duration::from_secs(2),
        )
        .await?;
        Ok(())
    }

    async fn disable_iframe_pointer_events(&self) -> Result<(), BrowserError> {
        self.eval(
            "(() => { const el = document.activeElement; \
             if (el && el.tagName === 'IFRAME') el.style.pointerEvents = 'none'; })()",
            Duration::from_secs(2),
        )
        .await?;
        Ok(())
    }

    async fn install_overlay(&self, script: &str) -> Result<(), BrowserError> {
        self.eval(script, Duration::from_secs(5)).await?;
        Ok(())
    }
}
