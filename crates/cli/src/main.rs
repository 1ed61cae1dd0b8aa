// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! obr: supervisory bridge CLI for the operator agent.

mod commands;
mod exit_error;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use commands::{doctor, logs, run, status, watch, web};
use exit_error::ExitError;

pub(crate) const EXIT_OK: i32 = 0;
pub(crate) const EXIT_GUARDRAIL: i32 = 2;
pub(crate) const EXIT_TIMEOUT: i32 = 3;
pub(crate) const EXIT_BOOTSTRAP: i32 = 4;
pub(crate) const EXIT_INVALID_ARGS: i32 = 5;

#[derive(Parser)]
#[command(name = "obr", about = "Supervisory bridge for an autonomous operator agent", version)]
struct Cli {
    /// Root directory for run artifacts (default: ./runs)
    #[arg(long, global = true, default_value = "runs")]
    runs_root: String,
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a task in the selected mode
    Run(run::RunArgs),
    /// Alias for `run --mode gui`
    GuiRun(run::TaskArgs),
    /// Alias for `run --mode web`
    WebRun(run::TaskArgs),
    /// Open a persistent browser session
    WebOpen(web::WebOpenArgs),
    /// Release assistant control of a session
    WebRelease(web::AttachArgs),
    /// Close a session and its browser
    WebClose(web::AttachArgs),
    /// Show run and session status
    Status,
    /// Tail the most recent run's bridge log
    Logs(logs::LogsArgs),
    /// Check environment readiness for a mode
    Doctor(doctor::DoctorArgs),
    /// Follow a session's control state and log live
    Live(watch::LiveArgs),
    /// Watch a session's log with filters and notifications
    Watch(watch::WatchArgs),
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help/version print normally; real parse errors are 5.
            if e.use_stderr() {
                eprintln!("{e}");
                std::process::exit(EXIT_INVALID_ARGS);
            }
            let _ = e.print();
            std::process::exit(EXIT_OK);
        }
    };

    let format = output::OutputFormat::from_json_flag(cli.json);
    let root = obr_storage::RunsRoot::new(&cli.runs_root);

    let result = match cli.command {
        Command::Run(args) => run::handle(args, &root, format).await,
        Command::GuiRun(args) => run::handle(args.into_mode(obr_core::Mode::Gui), &root, format).await,
        Command::WebRun(args) => run::handle(args.into_mode(obr_core::Mode::Web), &root, format).await,
        Command::WebOpen(args) => web::open(args, &root, format).await,
        Command::WebRelease(args) => web::release(args, &root, format).await,
        Command::WebClose(args) => web::close(args, &root, format).await,
        Command::Status => status::handle(&root, format).await,
        Command::Logs(args) => logs::handle(args, &root),
        Command::Doctor(args) => doctor::handle(args, &root).await,
        Command::Live(args) => watch::live(args, &root).await,
        Command::Watch(args) => watch::watch(args, &root).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.code);
        }
    }
}
