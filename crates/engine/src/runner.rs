// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The web-mode step loop.
//!
//! Steps are strictly serial. Each one passes prechecks, interacts with
//! a deadline, captures before/after evidence, and feeds the watchdog.
//! Failures are contained at step scope and routed into the retry and
//! handoff pipeline; nothing here aborts the run except the hard run
//! deadline.

use crate::deadline::Deadline;
use crate::observers::ObserverSource;
use obr_adapters::browser::overlay;
use obr_adapters::control::ControlAgentHandle;
use obr_adapters::{BrowserError, ClickOptions, PageDriver, Target};
use obr_core::evidence::{Evidence, EvidencePhase};
use obr_core::{
    Clock, ControlState, Finding, FindingKind, ObserverEvent, ObserverKind, Plan, ReportDraft,
    RunContext, Severity, Step, StepKind, StepOutcome, StepStatus, WatchdogState, WebSessionId,
};
use obr_storage::{LearningStore, RunPaths, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Maximum learned-selector retries per step in teaching mode.
const MAX_RETRIES: u32 = 2;

/// Everything the runner borrows from the session bootstrap.
pub struct WebRunDeps {
    pub driver: Arc<dyn PageDriver>,
    pub registry: SessionRegistry,
    pub learning: LearningStore,
    pub session_id: WebSessionId,
    pub agent_port: u16,
    pub observers: ObserverSource,
    /// Present when the run owns the session in-process.
    pub agent: Option<ControlAgentHandle>,
}

/// What the step loop hands to the finaliser.
pub struct RunSummary {
    pub draft: ReportDraft,
    pub findings: Vec<Finding>,
    pub verify_ok: bool,
    pub run_timed_out: bool,
    /// A learning window expired without capture; the session stays
    /// under user control.
    pub handoff_pending: bool,
}

pub struct WebRunner<C: Clock> {
    pub(crate) ctx: RunContext,
    pub(crate) paths: RunPaths,
    pub(crate) deps: WebRunDeps,
    pub(crate) clock: C,
    pub(crate) deadline: Deadline,
    pub(crate) watchdog: WatchdogState,
    pub(crate) draft: ReportDraft,
    pub(crate) findings: Vec<Finding>,
    pub(crate) verify_ok: bool,
    pub(crate) run_timed_out: bool,
    pub(crate) handoff_pending: bool,
    pub(crate) controlled: bool,
    pub(crate) learning_active: bool,
    pub(crate) current_step: usize,
    pub(crate) teaching_seq: u32,
    pub(crate) learning_window: Duration,
}

impl<C: Clock> WebRunner<C> {
    pub fn new(ctx: RunContext, paths: RunPaths, deps: WebRunDeps, clock: C) -> Self {
        let now = clock.now();
        let deadline = Deadline::new(&ctx.deadlines, now);
        let watchdog = WatchdogState::new(
            now,
            ctx.deadlines.interactive(),
            ctx.deadlines.step_hard(),
            ctx.deadlines.run_hard(),
            ctx.noise_mode,
        );
        let draft = ReportDraft::new(ctx.run_id.as_str(), ctx.goal());
        Self {
            ctx,
            paths,
            deps,
            clock,
            deadline,
            watchdog,
            draft,
            findings: Vec::new(),
            verify_ok: true,
            run_timed_out: false,
            handoff_pending: false,
            controlled: false,
            learning_active: false,
            current_step: 0,
            teaching_seq: 0,
            learning_window: obr_core::env::learning_window(),
        }
    }

    /// Shrink the learning window (tests).
    #[cfg(test)]
    pub(crate) fn set_learning_window(&mut self, window: Duration) {
        self.learning_window = window;
    }

    /// Execute the full plan and return the summary for finalisation.
    pub async fn run(mut self, plan: &Plan) -> RunSummary {
        if let Err(e) = self.bootstrap().await {
            tracing::warn!(error = %e, "overlay bootstrap degraded");
        }

        for step in plan.iter() {
            self.current_step = step.index;
            let now = self.clock.now();
            if self.deadline.run_expired(now) {
                self.note_run_timeout();
                break;
            }
            self.deadline.begin_step(now);
            self.watchdog.begin_step(now);
            self.pump_observers().await;

            if self.watchdog.stalled(self.clock.now()) && self.ctx.flags.teaching {
                let resumed = self.handoff(step, "no_useful_progress", None).await;
                if !resumed {
                    break;
                }
            }

            self.sync_observer_step().await;
            self.execute_step(step).await;

            if self.handoff_pending {
                break;
            }
        }

        self.pump_observers().await;
        self.teardown().await;

        RunSummary {
            draft: self.draft,
            findings: self.findings,
            verify_ok: self.verify_ok,
            run_timed_out: self.run_timed_out,
            handoff_pending: self.handoff_pending,
        }
    }

    async fn bootstrap(&mut self) -> Result<(), BrowserError> {
        self.transition_control(true, false, "").await;
        if self.ctx.flags.visual {
            self.deps.driver.install_overlay(&overlay::cursor_script()).await?;
        }
        self.deps
            .driver
            .install_overlay(&overlay::observer_script(self.deps.agent_port, 0))
            .await?;

        // Baseline context shot before the first step.
        let path = Evidence::screenshot_path(&self.paths.evidence_dir(), 0, EvidencePhase::Context);
        if self.deps.driver.screenshot(&path).await.is_ok() {
            self.push_evidence(&path);
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        // Cancellation and normal exit share this path: control released,
        // window closed unless keep-open or a pending learning window.
        if !self.handoff_pending {
            self.transition_control(false, false, "").await;
        }
    }

    async fn execute_step(&mut self, step: &Step) {
        match &step.kind {
            StepKind::VerifyVisible { target } => self.execute_verify(step, target).await,
            StepKind::WaitSelector { .. } | StepKind::WaitText { .. } => {
                self.frame_guard().await;
                self.execute_wait(step).await;
            }
            StepKind::Window { .. } => {
                self.push_outcome_with_finding(
                    StepOutcome::failed(step.index, StepStatus::Skipped, true),
                    Finding::new(FindingKind::Ui, step.index, "window ops require gui mode")
                        .severity(Severity::Info),
                );
            }
            _ => self.execute_interactive(step).await,
        }
    }

    async fn execute_verify(&mut self, step: &Step, target: &str) {
        let budget = self.deadline.interaction_budget(self.clock.now());
        let target = selector_or_text(target);
        let visible = match self.deps.driver.probe(&target, budget).await {
            Ok(app) => app.present && app.visible,
            Err(_) => false,
        };
        // Verify outcomes attach to the step they check, the preceding one.
        let anchor = step.index.saturating_sub(1);
        if visible {
            self.draft.push_observation(format!("verified visible: {}", target.describe()));
            self.draft.push_outcome(StepOutcome::ok(step.index, false));
            self.watchdog.tick_useful(self.clock.now());
        } else {
            self.verify_ok = false;
            self.findings.push(
                Finding::new(FindingKind::Ui, anchor, format!("verify failed: {}", target.describe()))
                    .severity(Severity::Error),
            );
            self.draft
                .push_outcome(StepOutcome::failed(step.index, StepStatus::TargetNotFound, false));
        }
    }

    async fn execute_wait(&mut self, step: &Step) {
        let target = match &step.kind {
            StepKind::WaitSelector { selector } => Target::Selector(selector.to_string()),
            StepKind::WaitText { text } => Target::Text(text.to_string()),
            _ => return,
        };
        let budget = self.deadline.interaction_budget(self.clock.now());
        match self.deps.driver.wait_for(&target, budget).await {
            Ok(()) => {
                self.draft.push_outcome(StepOutcome::ok(step.index, false));
                self.watchdog.tick_useful(self.clock.now());
            }
            Err(_) => {
                self.findings.push(
                    Finding::new(FindingKind::Ui, step.index, "interactive_timeout")
                        .attempted(format!("wait {}", target.describe())),
                );
                self.draft.push_outcome(StepOutcome::failed(step.index, StepStatus::Timeout, false));
            }
        }
    }

    async fn execute_interactive(&mut self, step: &Step) {
        let Some(action) = step.kind.action_string() else {
            return;
        };

        // Guardrails are fatal for the step, not the run.
        if let Err(violation) = obr_guard::check_action(self.ctx.mode, &self.ctx.flags, &action) {
            self.push_outcome_with_finding(
                StepOutcome::failed(step.index, StepStatus::BlockedGuardrail, true),
                Finding::new(
                    FindingKind::Ui,
                    step.index,
                    format!("guardrail {}: {violation}", violation.rule()),
                )
                .severity(Severity::Error),
            );
            return;
        }

        let stuck_iframe = self.frame_guard().await;

        let before =
            Evidence::screenshot_path(&self.paths.evidence_dir(), step.index, EvidencePhase::Before);
        let before_ok = self.capture_evidence(&before).await;

        let mut outcome = StepOutcome::ok(step.index, true);
        outcome.evidence_before = before_ok.then(|| before.display().to_string());

        match self.interact(step, None).await {
            Ok(selector_used) => {
                self.complete_ok(step, outcome, selector_used, action).await;
            }
            Err(e) => {
                let status = if stuck_iframe {
                    StepStatus::StuckIframe
                } else {
                    status_for(&e)
                };
                self.handle_failure(step, outcome, status, action).await;
            }
        }
    }

    /// Perform the primitive once, optionally overriding the target with
    /// a learned selector. Returns the selector that worked, if any.
    pub(crate) async fn interact(
        &mut self,
        step: &Step,
        learned_selector: Option<&str>,
    ) -> Result<Option<String>, BrowserError> {
        let budget = self.deadline.interaction_budget(self.clock.now());
        let click_opts = ClickOptions { human_mouse: self.ctx.flags.visual };
        match &step.kind {
            StepKind::OpenUrl { url } => {
                self.deps.driver.navigate(url, budget).await?;
                Ok(None)
            }
            StepKind::ClickText { text } => {
                let target = match learned_selector {
                    Some(s) => Target::Selector(s.to_string()),
                    None => Target::Text(text.to_string()),
                };
                self.precheck(&target, budget).await?;
                let used = self.deps.driver.click(&target, click_opts, budget).await?;
                Ok(Some(used))
            }
            StepKind::ClickSelector { selector } => {
                let target =
                    Target::Selector(learned_selector.unwrap_or(selector.as_str()).to_string());
                self.precheck(&target, budget).await?;
                let used = self.deps.driver.click(&target, click_opts, budget).await?;
                Ok(Some(used))
            }
            StepKind::Fill { selector, value } => {
                let target = Target::Selector(selector.to_string());
                self.precheck(&target, budget).await?;
                self.deps.driver.fill(selector, value, budget).await?;
                Ok(Some(selector.to_string()))
            }
            StepKind::Select { selector, choice } => {
                let target = Target::Selector(selector.to_string());
                self.precheck(&target, budget).await?;
                self.deps.driver.select(selector, choice, budget).await?;
                Ok(Some(selector.to_string()))
            }
            StepKind::WaitSelector { .. }
            | StepKind::WaitText { .. }
            | StepKind::VerifyVisible { .. }
            | StepKind::Window { .. } => Ok(None),
        }
    }

    /// Applicability precheck: present ∧ visible ∧ enabled. Keeps
    /// "target missing" distinct from interaction timeouts.
    async fn precheck(&self, target: &Target, budget: Duration) -> Result<(), BrowserError> {
        let app = self.deps.driver.probe(target, budget).await?;
        if app.actionable() {
            Ok(())
        } else {
            Err(BrowserError::TargetNotFound(target.describe()))
        }
    }

    async fn complete_ok(
        &mut self,
        step: &Step,
        mut outcome: StepOutcome,
        selector_used: Option<String>,
        action: String,
    ) {
        let after =
            Evidence::screenshot_path(&self.paths.evidence_dir(), step.index, EvidencePhase::After);
        if self.capture_evidence(&after).await {
            outcome.evidence_after = Some(after.display().to_string());
        }
        outcome.selector_used = selector_used;
        self.draft.push_action(action);
        self.draft.push_outcome(outcome);
        self.watchdog.tick_useful(self.clock.now());
        tracing::info!(step = step.index, kind = %step.kind, "step ok");
    }

    async fn handle_failure(
        &mut self,
        step: &Step,
        mut outcome: StepOutcome,
        status: StepStatus,
        action: String,
    ) {
        tracing::info!(step = step.index, kind = %step.kind, %status, "step failed, entering retry pipeline");

        if self.ctx.flags.teaching && matches!(status, StepStatus::Timeout | StepStatus::TargetNotFound)
        {
            if let Some(selector) = self.retry_with_learning(step, &mut outcome).await {
                let after = Evidence::screenshot_path(
                    &self.paths.evidence_dir(),
                    step.index,
                    EvidencePhase::After,
                );
                if self.capture_evidence(&after).await {
                    outcome.evidence_after = Some(after.display().to_string());
                }
                // The recorded action names the selector that worked.
                self.draft.push_action(action_with_selector(step, &selector));
                outcome.selector_used = Some(selector);
                self.draft.push_outcome(outcome);
                self.watchdog.tick_useful(self.clock.now());
                return;
            }
        }

        let what_failed = match status {
            StepStatus::Timeout => "interactive_timeout",
            StepStatus::TargetNotFound => "target_not_found",
            StepStatus::StuckIframe => "stuck_iframe_focus",
            _ => "step_failed",
        };

        if self.ctx.flags.teaching {
            outcome.status = status;
            let described = describe_step(step);
            self.findings.push(
                Finding::new(FindingKind::Ui, step.index, what_failed)
                    .attempted(described.clone())
                    .next_best_action("human_assist"),
            );
            // On timeout there is no successful after-shot and no action.
            let resumed = self.handoff(step, what_failed, Some(&action)).await;
            if resumed {
                return;
            }
            self.draft.push_outcome(outcome);
        } else {
            outcome.status = status;
            self.findings.push(
                Finding::new(FindingKind::Ui, step.index, what_failed)
                    .attempted(describe_step(step)),
            );
            self.draft.push_outcome(outcome);
        }
    }

    /// Learned-selector retries: scroll hints first (container, then
    /// page), recheck applicability, then the interaction. Evidence per
    /// retry attempt.
    async fn retry_with_learning(
        &mut self,
        step: &Step,
        outcome: &mut StepOutcome,
    ) -> Option<String> {
        let key = self.context_key().await;
        let ranked = self.deps.learning.ranked(&key).unwrap_or_default();
        let mut attempts = 0u32;

        for learned in ranked.iter().take(MAX_RETRIES as usize) {
            attempts += 1;
            outcome.retries = attempts;

            for hint in &learned.scroll_hints {
                let _ = self.deps.driver.scroll(hint).await;
            }

            let retry_shot = Evidence::screenshot_path(
                &self.paths.evidence_dir(),
                step.index,
                EvidencePhase::Retry(attempts),
            );
            self.capture_evidence(&retry_shot).await;

            match self.interact(step, Some(&learned.selector)).await {
                Ok(_) => {
                    let _ = self.deps.learning.record_success(
                        &key,
                        &learned.selector,
                        self.clock.epoch_ms(),
                    );
                    tracing::info!(step = step.index, selector = %learned.selector, "learned selector resolved the step");
                    return Some(learned.selector.clone());
                }
                Err(_) => {
                    let _ = self.deps.learning.record_failure(&key, &learned.selector);
                }
            }
        }
        None
    }

    /// Main-frame-first guard. Returns true when focus stayed stuck in
    /// an iframe even after disabling its pointer events.
    async fn frame_guard(&mut self) -> bool {
        let driver = self.deps.driver.clone();
        if !driver.focus_in_iframe().await.unwrap_or(false) {
            return false;
        }
        let _ = driver.escape_iframe().await;
        if !driver.focus_in_iframe().await.unwrap_or(false) {
            return false;
        }
        if !self.watchdog.stalled(self.clock.now()) {
            // Focus is in an iframe but progress is still being made.
            return false;
        }
        self.findings.push(
            Finding::new(FindingKind::Ui, self.current_step, "stuck_iframe_focus")
                .attempted("escape to main frame"),
        );
        let _ = driver.disable_iframe_pointer_events().await;
        let _ = driver.escape_iframe().await;
        driver.focus_in_iframe().await.unwrap_or(false)
    }

    /// Drain observer events, stamping them with the current step.
    async fn pump_observers(&mut self) {
        let events = self.deps.observers.drain().await;
        for mut event in events {
            event.step = self.current_step;
            self.apply_observer_event(&event);
        }
    }

    pub(crate) fn apply_observer_event(&mut self, event: &ObserverEvent) {
        let user_in_control = !self.controlled || self.learning_active;
        if self.watchdog.event_is_useful(event.kind, user_in_control) {
            self.watchdog.tick_useful(self.clock.now());
        }
        match event.kind {
            ObserverKind::ConsoleError | ObserverKind::PageError => {
                let text = event
                    .payload
                    .get("text")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown error");
                self.draft.push_console_error(format!("step {}: {text}", event.step));
            }
            ObserverKind::NetworkError => {
                let detail = if let Some(status) = event.payload.get("status").and_then(serde_json::Value::as_u64)
                {
                    let url = event
                        .payload
                        .get("url")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default();
                    format!("HTTP {status} {url}")
                } else {
                    event
                        .payload
                        .get("error")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("request failed")
                        .to_string()
                };
                self.draft.push_network_finding(format!("step {}: {detail}", event.step));
            }
            ObserverKind::Click
            | ObserverKind::ManualClick
            | ObserverKind::Scroll
            | ObserverKind::Mousemove => {}
        }
    }

    pub(crate) async fn capture_evidence(&mut self, path: &std::path::Path) -> bool {
        match self.deps.driver.screenshot(path).await {
            Ok(()) => {
                self.push_evidence(path);
                true
            }
            Err(e) => {
                // Evidence failures degrade gracefully; --verified makes
                // the gap fatal at finalisation.
                tracing::warn!(path = %path.display(), error = %e, "evidence capture failed");
                false
            }
        }
    }

    fn push_evidence(&mut self, path: &std::path::Path) {
        self.draft.push_evidence(path.display().to_string());
    }

    fn push_outcome_with_finding(&mut self, outcome: StepOutcome, finding: Finding) {
        self.findings.push(finding);
        self.draft.push_outcome(outcome);
    }

    fn note_run_timeout(&mut self) {
        self.run_timed_out = true;
        self.findings.push(
            Finding::new(FindingKind::Ui, self.current_step, "run_timeout")
                .severity(Severity::Error),
        );
        tracing::warn!(step = self.current_step, "hard run deadline reached");
    }

    async fn sync_observer_step(&mut self) {
        let script = overlay::observer_script(self.deps.agent_port, self.current_step);
        let _ = self.deps.driver.install_overlay(&script).await;
    }

    pub(crate) async fn context_key(&self) -> String {
        let url = self.deps.driver.url().await.unwrap_or_default();
        let signature = self.deps.driver.screen_signature().await.unwrap_or_default();
        obr_core::context_key(&host_of(&url), &signature)
    }

    /// Transition control booleans everywhere they are mirrored: local,
    /// agent, registry, and the top-bar.
    pub(crate) async fn transition_control(
        &mut self,
        controlled: bool,
        learning_active: bool,
        message: &str,
    ) {
        self.controlled = controlled;
        self.learning_active = learning_active;

        let run_id = self.ctx.run_id.clone();
        let updated = self.deps.registry.update(&self.deps.session_id, |s| {
            s.controlled = controlled;
            s.learning_active = learning_active;
            s.current_run_id = if controlled { Some(run_id.clone()) } else { None };
        });
        let incident_open = updated.map(|s| s.incident_open).unwrap_or(false);

        // The registry is the source of truth; the agent mirror follows
        // it, including the incident flag.
        if let Some(agent) = &self.deps.agent {
            agent.update_state(|s| {
                s.controlled = controlled;
                s.learning_active = learning_active;
                s.incident_open = incident_open;
            });
        } else {
            // Attached run: mirror through the session's agent.
            if let Ok(mut snapshot) =
                obr_adapters::control::probe_agent(self.deps.agent_port).await
            {
                snapshot.controlled = controlled;
                snapshot.learning_active = learning_active;
                snapshot.incident_open = incident_open;
                let _ = obr_adapters::control::agent_post(
                    self.deps.agent_port,
                    "/sync",
                    &serde_json::to_string(&snapshot).unwrap_or_default(),
                )
                .await;
            }
        }

        let state = ControlState::derive(controlled, learning_active, incident_open, true);
        let script = if ControlState::overlay_required(controlled, learning_active, incident_open) {
            overlay::topbar_script(&state, message, self.deps.agent_port)
        } else {
            overlay::topbar_remove_script()
        };
        let _ = self.deps.driver.install_overlay(&script).await;
    }

}

/// Action string for a step resolved through a learned selector: click
/// primitives report the selector that actually worked.
pub(crate) fn action_with_selector(step: &Step, selector: &str) -> String {
    match &step.kind {
        StepKind::ClickText { .. } | StepKind::ClickSelector { .. } => {
            format!("cmd: playwright click selector:{selector}")
        }
        other => other.action_string().unwrap_or_default(),
    }
}

/// Map a browser error to a step status.
fn status_for(e: &BrowserError) -> StepStatus {
    match e {
        BrowserError::TargetNotFound(_) => StepStatus::TargetNotFound,
        BrowserError::Timeout(_) => StepStatus::Timeout,
        _ => StepStatus::Stuck,
    }
}

/// Resolve a verify target written as either a selector or literal text.
fn selector_or_text(target: &str) -> Target {
    if target.starts_with(['#', '.', '[']) || target.contains(" > ") {
        Target::Selector(target.to_string())
    } else {
        Target::Text(target.to_string())
    }
}

pub(crate) fn describe_step(step: &Step) -> String {
    match step.kind.target() {
        Some(target) => format!("{} {target}", step.kind),
        None => step.kind.to_string(),
    }
}

pub(crate) fn host_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split(['/', '?', '#']).next())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
#[path = "runner_tests.rs"]
pub(crate) mod tests;
