// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injected page UI: the control top-bar and the visual cursor.
//!
//! The top-bar's buttons talk to the session's loopback control agent,
//! not to the run, so the buttons keep working after the run ends. The scripts
//! are idempotent: re-injection updates the existing bar in place.

use obr_core::{ControlColor, ControlState};

/// Overlay chrome element IDs; manual clicks on these are never captured
/// as teaching.
pub const TOPBAR_ID: &str = "__obr_topbar";
pub const CURSOR_ID: &str = "__obr_cursor";

/// Build the top-bar injection script for the given state.
///
/// The bar animates in, collapses to a slim hot-area after a few seconds,
/// and re-reveals on hover. Border and label follow the control color.
pub fn topbar_script(state: &ControlState, message: &str, agent_port: u16) -> String {
    let color = css_color(state.color);
    let label = serde_json::json!(&state.label).to_string();
    let message = serde_json::json!(message).to_string();
    format!(
        r#"(() => {{
  let bar = document.getElementById('{TOPBAR_ID}');
  if (!bar) {{
    bar = document.createElement('div');
    bar.id = '{TOPBAR_ID}';
    bar.style.cssText = 'position:fixed;top:0;left:0;right:0;z-index:2147483647;' +
      'font:13px system-ui,sans-serif;color:#fff;padding:6px 12px;display:flex;' +
      'gap:12px;align-items:center;transition:transform .3s ease;transform:translateY(-100%);';
    const hot = document.createElement('div');
    hot.style.cssText = 'position:fixed;top:0;left:0;right:0;height:6px;z-index:2147483646;';
    hot.addEventListener('mouseenter', () => {{ bar.style.transform = 'translateY(0)'; }});
    bar.addEventListener('mouseleave', () => {{ bar.style.transform = 'translateY(-100%)'; }});
    document.documentElement.appendChild(hot);
    document.documentElement.appendChild(bar);
    requestAnimationFrame(() => {{ bar.style.transform = 'translateY(0)'; }});
    setTimeout(() => {{ bar.style.transform = 'translateY(-100%)'; }}, 6000);
  }}
  bar.style.background = '{color}';
  bar.style.borderBottom = '2px solid #fff3';
  const post = action => fetch('http://127.0.0.1:{agent_port}/action', {{
    method: 'POST', headers: {{'Content-Type': 'application/json'}},
    body: JSON.stringify({{action}})
  }}).catch(() => {{}});
  bar.innerHTML = '';
  const label = document.createElement('strong');
  label.textContent = {label};
  const msg = document.createElement('span');
  msg.textContent = {message};
  msg.style.flex = '1';
  bar.appendChild(label);
  bar.appendChild(msg);
  for (const [text, action] of [['Refresh','refresh'],['Release','release'],['Close','close'],['Clear incident','ack']]) {{
    const b = document.createElement('button');
    b.textContent = text;
    b.style.cssText = 'background:#fff2;border:1px solid #fff5;color:#fff;border-radius:3px;padding:2px 8px;cursor:pointer;';
    b.addEventListener('click', e => {{ e.stopPropagation(); post(action); }});
    bar.appendChild(b);
  }}
}})()"#
    )
}

/// Remove the top-bar (released sessions with no incident).
pub fn topbar_remove_script() -> String {
    format!(
        "(() => {{ const bar = document.getElementById('{TOPBAR_ID}'); if (bar) bar.remove(); }})()"
    )
}

/// Build the cursor/click-pulse overlay used in visual mode.
pub fn cursor_script() -> String {
    format!(
        r#"(() => {{
  if (document.getElementById('{CURSOR_ID}')) return;
  const dot = document.createElement('div');
  dot.id = '{CURSOR_ID}';
  dot.style.cssText = 'position:fixed;width:14px;height:14px;border-radius:50%;' +
    'background:#e33;opacity:.7;pointer-events:none;z-index:2147483647;transition:left .05s,top .05s;';
  document.documentElement.appendChild(dot);
  window.addEventListener('mousemove', e => {{
    dot.style.left = (e.clientX - 7) + 'px';
    dot.style.top = (e.clientY - 7) + 'px';
  }}, true);
  window.addEventListener('mousedown', () => {{
    dot.style.transform = 'scale(1.8)';
    setTimeout(() => {{ dot.style.transform = 'scale(1)'; }}, 180);
  }}, true);
}})()"#
    )
}

/// Observer hook: reports manual clicks, scrolls, and mousemoves to the
/// control agent with the current step index. Clicks on overlay chrome
/// are filtered here, at the source.
pub fn observer_script(agent_port: u16, step: usize) -> String {
    format!(
        r#"(() => {{
  if (window.__obrObserverStep !== undefined) {{ window.__obrObserverStep = {step}; return; }}
  window.__obrObserverStep = {step};
  const post = (kind, payload) => fetch('http://127.0.0.1:{agent_port}/event', {{
    method: 'POST', headers: {{'Content-Type': 'application/json'}},
    body: JSON.stringify({{kind, step: window.__obrObserverStep, payload, ts: Date.now()}})
  }}).catch(() => {{}});
  const chrome = el => !!(el.closest && (el.closest('#{TOPBAR_ID}') || el.closest('#{CURSOR_ID}')));
  window.addEventListener('click', e => {{
    if (chrome(e.target)) return;
    const sel = e.target.id ? '#' + CSS.escape(e.target.id) : e.target.tagName.toLowerCase();
    post('manual_click', {{selector: sel, text: (e.target.textContent || '').trim().slice(0, 80),
      scrollY: window.scrollY}});
  }}, true);
  window.addEventListener('scroll', () => post('scroll', {{y: window.scrollY}}), true);
  let lastMove = 0;
  window.addEventListener('mousemove', () => {{
    const now = Date.now();
    if (now - lastMove > 500) {{ lastMove = now; post('mousemove', {{}}); }}
  }}, true);
}})()"#
    )
}

fn css_color(color: ControlColor) -> &'static str {
    match color {
        ControlColor::Blue => "#1e66d0",
        ControlColor::Orange => "#d07a1e",
        ControlColor::Red => "#c63030",
        ControlColor::Green => "#2c8a4b",
        ControlColor::Gray => "#5a5f66",
    }
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod tests;
