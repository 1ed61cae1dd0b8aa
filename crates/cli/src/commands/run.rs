// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `obr run` - execute one task in one mode, emit exactly one report.

use crate::exit_error::ExitError;
use crate::output::OutputFormat;
use crate::{EXIT_GUARDRAIL, EXIT_OK, EXIT_TIMEOUT};
use clap::Args;
use obr_core::run::Deadlines;
use obr_core::{Clock, Mode, Plan, RunContext, RunFlags, RunId, RunResult, SystemClock, WebSessionId};
use obr_engine::{
    attach_session, close_session, finalize_run, open_session, run_narrative_mode, FinalizeInput,
    ObserverSource, WebRunDeps, WebRunner,
};
use obr_plan::{parse_task, PlanError};
use obr_storage::{atomic_write_json, LearningStore, RunsRoot, SessionRegistry, StatusIndex};

#[derive(Args)]
pub struct RunArgs {
    /// Task text
    pub task: String,
    /// Execution backend
    #[arg(long, value_parser = parse_mode, default_value = "shell")]
    pub mode: Mode,
    /// Require before/after evidence for every interactive step
    #[arg(long)]
    pub verified: bool,
    /// Cursor overlay and human-mouse trajectories
    #[arg(long)]
    pub visual: bool,
    /// Retries with learned selectors plus the handoff pipeline
    #[arg(long)]
    pub teaching: bool,
    /// Allow sensitive actions (input injection)
    #[arg(long)]
    pub confirm_sensitive: bool,
    /// Attach to an existing web session instead of opening one
    #[arg(long)]
    pub attach: Option<String>,
    /// Leave the browser open after the run
    #[arg(long)]
    pub keep_open: bool,
}

/// Argument set for the `gui-run` / `web-run` aliases.
#[derive(Args)]
pub struct TaskArgs {
    pub task: String,
    #[arg(long)]
    pub verified: bool,
    #[arg(long)]
    pub visual: bool,
    #[arg(long)]
    pub teaching: bool,
    #[arg(long)]
    pub confirm_sensitive: bool,
    #[arg(long)]
    pub attach: Option<String>,
    #[arg(long)]
    pub keep_open: bool,
}

impl TaskArgs {
    pub fn into_mode(self, mode: Mode) -> RunArgs {
        RunArgs {
            task: self.task,
            mode,
            verified: self.verified,
            visual: self.visual,
            teaching: self.teaching,
            confirm_sensitive: self.confirm_sensitive,
            attach: self.attach,
            keep_open: self.keep_open,
        }
    }
}

pub(crate) fn parse_mode(s: &str) -> Result<Mode, String> {
    match s {
        "shell" => Ok(Mode::Shell),
        "gui" => Ok(Mode::Gui),
        "web" => Ok(Mode::Web),
        other => Err(format!("unknown mode: {other} (expected shell|gui|web)")),
    }
}

pub async fn handle(args: RunArgs, root: &RunsRoot, format: OutputFormat) -> Result<i32, ExitError> {
    let clock = SystemClock;
    let flags = RunFlags {
        verified: args.verified,
        visual: args.visual,
        teaching: args.teaching,
        confirm_sensitive: args.confirm_sensitive,
        keep_open: args.keep_open,
    };

    // The plan is frozen before anything touches a backend. Parse errors
    // are fatal for web mode; shell/gui tasks are free prose for the
    // narrative executor, so only an empty task is fatal there.
    let plan = match parse_task(&args.task, args.mode) {
        Ok(plan) => plan,
        Err(PlanError::UnparseableTask(_)) if args.mode != Mode::Web => obr_core::Plan::default(),
        Err(e) => return Err(ExitError::invalid_args(e.to_string())),
    };

    let paths = root.allocate_run(&RunId::derive(&args.task, clock.epoch_ms()))?;
    let _log_guard = crate::logging::init_run_logging(&paths.run_dir);
    tracing::info!(run_id = %paths.run_id, mode = %args.mode, "run starting");

    let ctx = RunContext {
        run_id: paths.run_id.clone(),
        run_dir: paths.run_dir.clone(),
        task: args.task.clone(),
        mode: args.mode,
        flags,
        deadlines: Deadlines::from_env(),
        noise_mode: obr_core::env::observer_noise_mode(),
        attach_session_id: args.attach.as_deref().map(WebSessionId::from_string),
        created_at_ms: clock.epoch_ms(),
    };
    atomic_write_json(&paths.prompt(), &ctx)?;

    let status = StatusIndex::new(root.status_file());
    status.set_running(&ctx.run_id, ctx.mode, clock.epoch_ms())?;

    // Bootstrap failures are fatal to the run but never to the report:
    // the finaliser always runs, leaving a failed report with zero ok
    // outcomes and a status entry that is not `running`.
    let mut bootstrap_error: Option<ExitError> = None;
    let (draft, findings, verify_ok, run_timed_out, handoff_pending) = match ctx.mode {
        Mode::Web => match run_web(&ctx, &paths, root, &clock, &plan).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "web run bootstrap failed");
                let draft = obr_core::ReportDraft::new(ctx.run_id.as_str(), ctx.goal());
                let findings = vec![
                    obr_core::Finding::new(
                        obr_core::FindingKind::Ui,
                        0,
                        format!("bootstrap failed: {e}"),
                    )
                    .severity(obr_core::Severity::Fatal),
                ];
                bootstrap_error = Some(e);
                (draft, findings, true, false, false)
            }
        },
        Mode::Shell | Mode::Gui => {
            let (draft, findings) = run_narrative_mode(&ctx, &paths, &plan).await;
            (draft, findings, true, false, false)
        }
    };

    let report = finalize_run(
        FinalizeInput {
            ctx: ctx.clone(),
            paths: paths.clone(),
            draft,
            findings,
            verify_ok,
            run_timed_out,
            handoff_pending,
        },
        &status,
        clock.epoch_ms(),
    );

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default()),
        OutputFormat::Text => {
            println!("run:     {}", ctx.run_id);
            println!("result:  {}", report.result);
            println!("actions: {}", report.actions.len());
            println!("report:  {}", paths.report().display());
        }
    }

    if let Some(e) = bootstrap_error {
        return Err(e);
    }
    Ok(exit_code_for(&report, run_timed_out))
}

type WebOutcome = (obr_core::ReportDraft, Vec<obr_core::Finding>, bool, bool, bool);

async fn run_web(
    ctx: &RunContext,
    paths: &obr_storage::RunPaths,
    root: &RunsRoot,
    clock: &SystemClock,
    plan: &Plan,
) -> Result<WebOutcome, ExitError> {
    let registry = SessionRegistry::new(root.sessions_dir());
    let learning = LearningStore::new(root.learning_file());

    let (deps, owned_session) = match &ctx.attach_session_id {
        Some(id) => {
            let attached = attach_session(&registry, id, clock).await?;
            let agent_port = attached.session.agent_port;
            (
                WebRunDeps {
                    driver: attached.page,
                    registry: registry.clone(),
                    learning,
                    session_id: attached.session.session_id.clone(),
                    agent_port,
                    observers: ObserverSource::polling(agent_port),
                    agent: None,
                },
                None,
            )
        }
        None => {
            // Fresh session owned by this run; headed when a human needs
            // to see or help.
            let headed = ctx.flags.visual || ctx.flags.teaching || ctx.flags.keep_open;
            let mut opened =
                open_session(&registry, &root.sessions_dir(), None, headed, clock).await?;
            let agent_port = opened.agent.port();
            let events = opened.agent.take_events();
            let session_id = opened.session.session_id.clone();
            let observers = match events {
                Some(rx) => ObserverSource::channel(rx),
                None => ObserverSource::polling(agent_port),
            };
            (
                WebRunDeps {
                    driver: opened.page,
                    registry: registry.clone(),
                    learning,
                    session_id: session_id.clone(),
                    agent_port,
                    observers,
                    agent: Some(opened.agent),
                },
                Some(session_id),
            )
        }
    };

    let cleanup_session = match &owned_session {
        Some(id) => id.clone(),
        None => ctx.attach_session_id.clone().unwrap_or_else(|| WebSessionId::from_string("")),
    };

    let runner = WebRunner::new(ctx.clone(), paths.clone(), deps, clock.clone());
    // An interrupt takes the same finalisation path as a normal exit:
    // the session is released and the report still gets written.
    let summary = tokio::select! {
        summary = runner.run(plan) => summary,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupt received; finalising");
            if !cleanup_session.is_empty() {
                let _ = obr_engine::release_session(&registry, &cleanup_session);
            }
            obr_engine::RunSummary {
                draft: obr_core::ReportDraft::new(ctx.run_id.as_str(), ctx.goal()),
                findings: vec![
                    obr_core::Finding::new(obr_core::FindingKind::Ui, 0, "interrupted")
                        .severity(obr_core::Severity::Error),
                ],
                verify_ok: true,
                run_timed_out: false,
                handoff_pending: false,
            }
        }
    };

    // A session this run opened closes with it, unless the operator asked
    // to keep it or a learning window is pending.
    if let Some(session_id) = owned_session {
        if !ctx.flags.keep_open && !summary.handoff_pending {
            let _ = close_session(&registry, &session_id);
        }
    }

    Ok((
        summary.draft,
        summary.findings,
        summary.verify_ok,
        summary.run_timed_out,
        summary.handoff_pending,
    ))
}

/// Exit code mapping: timeouts and guardrail-only failures are
/// distinguishable for scripting.
fn exit_code_for(report: &obr_core::Report, run_timed_out: bool) -> i32 {
    if report.result == RunResult::Failed && run_timed_out {
        return EXIT_TIMEOUT;
    }
    if report.result == RunResult::Failed
        && report.ui_findings.iter().any(|f| f.contains("guardrail"))
        && report.actions.is_empty()
    {
        return EXIT_GUARDRAIL;
    }
    EXIT_OK
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
