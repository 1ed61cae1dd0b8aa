// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task parsing: markers, natural-language fallbacks, auto-insertion.

use crate::url::normalize_url;
use obr_core::{Mode, Plan, Step, StepKind, StepOrigin, WindowOp};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Fatal plan construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("unparseable task: {0}")]
    UnparseableTask(String),
    #[error("ambiguous url: found both {first} and {second}")]
    AmbiguousUrl { first: String, second: String },
    #[error("empty plan")]
    EmptyPlan,
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(pattern).expect("static pattern")
    })
}

macro_rules! static_re {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            re(&CELL, $pattern)
        }
    };
}

static_re!(click_selector_re, r#"(?i)click\s+selector:"([^"]+)""#);
static_re!(fill_re, r#"(?i)fill\s+selector:"([^"]+)"\s+value:"([^"]*)""#);
static_re!(select_re, r#"(?i)select\s+(?:"([^"]+)"|(\S+))\s+from\s+selector\s+"([^"]+)""#);
static_re!(wait_selector_re, r#"(?i)wait\s+selector:"([^"]+)""#);
static_re!(wait_text_re, r#"(?i)wait\s+text:"([^"]+)""#);
static_re!(window_bare_re, r"(?i)window:(list|active)\b");
static_re!(window_arg_re, r#"(?i)window:(activate|open)\s+(?:"([^"]+)"|([^\s,]+))"#);
static_re!(verify_re, r#"(?i)verify\s+visible(?:\s+"([^"]+)")?"#);
static_re!(verifica_re, r#"(?i)verifica(?:\s+que)?\s+"?([^",.;]+)"?"#);
static_re!(click_text_re, r#"(?i)(?:haz\s+)?click\s+(?:on\s+)?(?:en\s+)?(?:el\s+)?(?:bot[oó]n\s+)?"([^"]+)""#);
static_re!(url_re, r#"https?://[^\s"'<>]+"#);

struct Candidate {
    start: usize,
    end: usize,
    kind: StepKind,
}

/// Collector with overlap suppression: patterns are tried in priority
/// order and later matches that overlap a consumed span are skipped.
#[derive(Default)]
struct Matches {
    candidates: Vec<Candidate>,
}

impl Matches {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.candidates.iter().any(|c| start < c.end && end > c.start)
    }

    fn push(&mut self, start: usize, end: usize, kind: StepKind) {
        if !self.overlaps(start, end) {
            self.candidates.push(Candidate { start, end, kind });
        }
    }
}

/// Parse a free-text task into a frozen plan.
///
/// Order is the order of appearance in the task text. Subsequent
/// components must not reorder the result.
pub fn parse_task(task: &str, mode: Mode) -> Result<Plan, PlanError> {
    if task.trim().is_empty() {
        return Err(PlanError::EmptyPlan);
    }

    let mut matches = Matches::default();

    for cap in click_selector_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        let selector = cap[1].trim().into();
        matches.push(m.start(), m.end(), StepKind::ClickSelector { selector });
    }
    for cap in fill_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        matches.push(
            m.start(),
            m.end(),
            StepKind::Fill { selector: cap[1].trim().into(), value: cap[2].to_string() },
        );
    }
    for cap in select_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        let choice = cap.get(1).or_else(|| cap.get(2)).map(|c| c.as_str()).unwrap_or_default();
        matches.push(
            m.start(),
            m.end(),
            StepKind::Select { selector: cap[3].trim().into(), choice: choice.to_string() },
        );
    }
    for cap in wait_selector_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        matches.push(m.start(), m.end(), StepKind::WaitSelector { selector: cap[1].trim().into() });
    }
    for cap in wait_text_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        matches.push(m.start(), m.end(), StepKind::WaitText { text: cap[1].trim().into() });
    }
    for cap in window_arg_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        let arg = cap.get(2).or_else(|| cap.get(3)).map(|c| c.as_str()).unwrap_or_default();
        let op = if cap[1].eq_ignore_ascii_case("activate") {
            WindowOp::Activate(arg.to_string())
        } else {
            WindowOp::Open(arg.to_string())
        };
        matches.push(m.start(), m.end(), StepKind::Window { op });
    }
    for cap in window_bare_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        let op = if cap[1].eq_ignore_ascii_case("list") { WindowOp::List } else { WindowOp::Active };
        matches.push(m.start(), m.end(), StepKind::Window { op });
    }
    for cap in verify_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        let target = cap.get(1).map(|c| c.as_str().trim()).unwrap_or_default();
        matches.push(m.start(), m.end(), StepKind::VerifyVisible { target: target.into() });
    }
    for cap in verifica_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        let target = cap[1].trim();
        let target = target.strip_prefix("el ").or_else(|| target.strip_prefix("la ")).unwrap_or(target);
        matches.push(m.start(), m.end(), StepKind::VerifyVisible { target: target.trim().into() });
    }
    for cap in click_text_re().captures_iter(task) {
        let m = cap.get(0).ok_or_else(|| PlanError::UnparseableTask(task.into()))?;
        matches.push(m.start(), m.end(), StepKind::ClickText { text: cap[1].trim().into() });
    }

    // URL extraction last: at most one distinct normalised URL, skipping
    // spans already consumed (e.g. a window:open argument).
    let mut url: Option<(usize, String)> = None;
    for m in url_re().find_iter(task) {
        if matches.overlaps(m.start(), m.end()) {
            continue;
        }
        let normalized = normalize_url(m.as_str())
            .ok_or_else(|| PlanError::UnparseableTask(format!("invalid url: {}", m.as_str())))?;
        match &url {
            None => url = Some((m.start(), normalized)),
            Some((_, first)) if *first == normalized => {}
            Some((_, first)) => {
                return Err(PlanError::AmbiguousUrl {
                    first: first.clone(),
                    second: normalized,
                })
            }
        }
    }
    if let Some((start, url)) = url {
        matches.push(start, start + url.len(), StepKind::OpenUrl { url });
    }

    matches.candidates.sort_by_key(|c| c.start);

    let mut steps: Vec<Step> = Vec::with_capacity(matches.candidates.len());
    for candidate in matches.candidates {
        let mut kind = candidate.kind;
        // A bare `verify visible` checks the preceding step's target.
        if let StepKind::VerifyVisible { target } = &kind {
            if target.is_empty() {
                let fallback = steps
                    .last()
                    .and_then(|s: &Step| s.kind.target())
                    .unwrap_or("body")
                    .to_string();
                kind = StepKind::VerifyVisible { target: fallback.into() };
            }
        }
        steps.push(Step { index: steps.len(), kind, optional: false, origin: StepOrigin::Task });
    }

    insert_demo_login(task, mode, &mut steps);

    if steps.is_empty() {
        return Err(PlanError::UnparseableTask(task.trim().to_string()));
    }

    tracing::debug!(steps = steps.len(), %mode, "plan frozen");
    Ok(Plan { steps })
}

const DEMO_LOGIN_TEXT: &str = "Entrar demo";

/// Auto-insert the demo-login click when the task implies a demo context
/// and no explicit demo click is present (prevents the double-click
/// regression).
fn insert_demo_login(task: &str, mode: Mode, steps: &mut Vec<Step>) {
    if mode != Mode::Web || !task.to_lowercase().contains("demo") {
        return;
    }
    let already_present = steps.iter().any(|s| {
        matches!(&s.kind, StepKind::ClickText { text } if text.eq_ignore_ascii_case(DEMO_LOGIN_TEXT))
    });
    if already_present {
        return;
    }
    let Some(open_pos) = steps.iter().position(|s| matches!(s.kind, StepKind::OpenUrl { .. }))
    else {
        return;
    };
    steps.insert(
        open_pos + 1,
        Step {
            index: 0,
            kind: StepKind::ClickText { text: DEMO_LOGIN_TEXT.into() },
            optional: false,
            origin: StepOrigin::Auto,
        },
    );
    for (i, step) in steps.iter_mut().enumerate() {
        step.index = i;
    }
}

/// Render a plan back into canonical marker text.
///
/// `parse_task(serialize_plan(plan), mode)` reproduces the plan for plans
/// whose steps are all expressible as markers.
pub fn serialize_plan(plan: &Plan) -> String {
    let parts: Vec<String> = plan
        .steps
        .iter()
        .map(|step| match &step.kind {
            StepKind::OpenUrl { url } => format!("open {url}"),
            StepKind::ClickText { text } => format!("click \"{text}\""),
            StepKind::ClickSelector { selector } => format!("click selector:\"{selector}\""),
            StepKind::Fill { selector, value } => {
                format!("fill selector:\"{selector}\" value:\"{value}\"")
            }
            StepKind::Select { selector, choice } => {
                format!("select \"{choice}\" from selector \"{selector}\"")
            }
            StepKind::WaitSelector { selector } => format!("wait selector:\"{selector}\""),
            StepKind::WaitText { text } => format!("wait text:\"{text}\""),
            StepKind::VerifyVisible { target } => format!("verify visible \"{target}\""),
            StepKind::Window { op } => match op {
                WindowOp::List => "window:list".to_string(),
                WindowOp::Active => "window:active".to_string(),
                WindowOp::Activate(x) => format!("window:activate \"{x}\""),
                WindowOp::Open(x) => format!("window:open \"{x}\""),
            },
        })
        .collect();
    parts.join(", ")
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
