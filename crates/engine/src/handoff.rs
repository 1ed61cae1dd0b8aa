// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Teaching handoff: cede control, open a learning window, capture a
//! useful manual click, and resume with what was learned.

use crate::runner::{describe_step, host_of, WebRunner};
use obr_core::evidence::{Evidence, EvidencePhase};
use obr_core::learning::ScrollHint;
use obr_core::{Clock, ObserverEvent, ObserverKind, Step, StepKind, StepOutcome, TeachingCapture};
use obr_storage::atomic_write_json;

impl<C: Clock> WebRunner<C> {
    /// Hand control to the user over the stuck step. Returns true when a
    /// capture arrived and the learning-resume re-ran the step
    /// successfully; the ok outcome is recorded here in that case.
    pub(crate) async fn handoff(
        &mut self,
        step: &Step,
        what_failed: &str,
        action: Option<&str>,
    ) -> bool {
        let described = describe_step(step);
        tracing::info!(step = step.index, what_failed, "handing off to user");

        // Orange bar, assistant control released, window stays open
        // regardless of --keep-open.
        let message =
            format!("Me he atascado en: {described}. Te cedo el control para que me ayudes.");
        self.transition_control(false, true, &message).await;

        let window = self.learning_window;
        let deadline = self.clock.now() + window;
        let capture = loop {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                break None;
            }
            let Some(mut event) = self.deps.observers.next(remaining.min(window)).await else {
                break None;
            };
            event.step = step.index;
            if event.kind != ObserverKind::ManualClick {
                self.apply_observer_event(&event);
                continue;
            }
            if let Some(capture) = self.useful_manual_click(step, &event).await {
                break Some(capture);
            }
        };

        let Some(capture) = capture else {
            // Expiry without capture: the session stays under user
            // control, an incident opens, and the run finalises as
            // partial. Only an explicit ack clears the incident.
            tracing::info!(step = step.index, "learning window expired without capture");
            self.open_incident(&described).await;
            self.mark_handoff_pending();
            return false;
        };

        self.persist_capture(&capture);

        let thanks = "Gracias, ya he aprendido cómo hacerlo. Ya continúo yo.";
        self.transition_control(true, false, thanks).await;

        // Learning-resume: one more attempt with the new selector first.
        match self.interact(step, Some(&capture.selector)).await {
            Ok(_) => {
                let _ = self.deps.learning.record_success(
                    &capture.context_key,
                    &capture.selector,
                    self.clock.epoch_ms(),
                );
                let after = Evidence::screenshot_path(
                    &self.paths.evidence_dir(),
                    step.index,
                    EvidencePhase::After,
                );
                let mut outcome = StepOutcome::ok(step.index, step.kind.is_interactive());
                let before = Evidence::screenshot_path(
                    &self.paths.evidence_dir(),
                    step.index,
                    EvidencePhase::Before,
                );
                if before.exists() {
                    outcome.evidence_before = Some(before.display().to_string());
                }
                if self.capture_evidence(&after).await {
                    outcome.evidence_after = Some(after.display().to_string());
                }
                outcome.selector_used = Some(capture.selector.clone());
                if action.is_some() {
                    self.draft.push_action(crate::runner::action_with_selector(step, &capture.selector));
                }
                self.draft.push_outcome(outcome);
                self.watchdog.tick_useful(self.clock.now());
                tracing::info!(step = step.index, selector = %capture.selector, "learning-resume succeeded");
                true
            }
            Err(e) => {
                tracing::warn!(step = step.index, error = %e, "learning-resume failed");
                self.open_incident(&described).await;
                self.mark_handoff_pending();
                false
            }
        }
    }

    /// Open an incident on the session: persisted in the registry first,
    /// then mirrored to the agent and the top-bar (red). Release never
    /// clears it; only an ack does.
    async fn open_incident(&mut self, described: &str) {
        if let Err(e) = self
            .deps
            .registry
            .update(&self.deps.session_id, |s| s.incident_open = true)
        {
            tracing::warn!(error = %e, "incident could not be persisted");
        }
        let message = format!("Incidencia abierta en: {described}. Pulsa Clear incident al resolverla.");
        self.transition_control(false, false, &message).await;
    }

    /// A useful manual click is inside the main document (overlay chrome
    /// is filtered at the source), and semantically consistent with the
    /// stuck objective: selector match or text containment.
    pub(crate) async fn useful_manual_click(
        &mut self,
        step: &Step,
        event: &ObserverEvent,
    ) -> Option<TeachingCapture> {
        let selector = event.payload.get("selector")?.as_str()?.to_string();
        let text = event
            .payload
            .get("text")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        let consistent = match &step.kind {
            StepKind::ClickText { text: wanted } => {
                let wanted = wanted.trim().to_lowercase();
                !wanted.is_empty()
                    && (text.to_lowercase().contains(&wanted)
                        || selector.to_lowercase().contains(&wanted.replace(' ', "-")))
            }
            StepKind::ClickSelector { selector: wanted } => {
                selector == wanted.as_str() || selector.contains(wanted.as_str())
            }
            StepKind::Fill { selector: wanted, .. } | StepKind::Select { selector: wanted, .. } => {
                selector.contains(wanted.as_str())
            }
            _ => !selector.is_empty(),
        };
        if !consistent {
            tracing::debug!(%selector, "manual click ignored (not consistent with objective)");
            return None;
        }

        let url = self.deps.driver.url().await.unwrap_or_default();
        let signature = self.deps.driver.screen_signature().await.unwrap_or_default();
        let scroll_hints = event
            .payload
            .get("scrollY")
            .and_then(serde_json::Value::as_i64)
            .filter(|y| *y != 0)
            .map(|y| vec![ScrollHint { container: String::new(), top: y }])
            .unwrap_or_default();

        Some(TeachingCapture {
            selector,
            text,
            url: url.clone(),
            context_key: obr_core::context_key(&host_of(&url), &signature),
            scroll_hints,
            timestamp: self.clock.epoch_ms(),
        })
    }

    /// Persist the capture: per-run artifact, then the global store.
    fn persist_capture(&mut self, capture: &TeachingCapture) {
        self.teaching_seq += 1;
        let path = self.paths.teaching_file(self.teaching_seq);
        if let Err(e) = atomic_write_json(&path, capture) {
            tracing::warn!(error = %e, "teaching artifact write failed");
        } else {
            self.draft.push_observation(format!(
                "learned selector {} for {}",
                capture.selector, capture.context_key
            ));
        }
        if let Err(e) = self.deps.learning.merge_capture(capture) {
            tracing::warn!(error = %e, "global learning store merge failed");
        }
    }

    pub(crate) fn mark_handoff_pending(&mut self) {
        self.handoff_pending = true;
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
