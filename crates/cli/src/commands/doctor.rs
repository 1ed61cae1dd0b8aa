// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `obr doctor` - environment readiness checks per mode.

use crate::exit_error::ExitError;
use crate::{EXIT_BOOTSTRAP, EXIT_OK};
use clap::Args;
use obr_core::Mode;
use obr_engine::probe_liveness;
use obr_storage::{RunsRoot, SessionRegistry, StatusIndex};

#[derive(Args)]
pub struct DoctorArgs {
    #[arg(long, value_parser = super::run::parse_mode, default_value = "shell")]
    pub mode: Mode,
}

struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
    fatal: bool,
}

pub async fn handle(args: DoctorArgs, root: &RunsRoot) -> Result<i32, ExitError> {
    crate::logging::init_diagnostic_logging();
    let mut checks = Vec::new();

    let oi = obr_core::env::oi_command();
    checks.push(Check {
        name: "operator agent binary",
        ok: binary_on_path(&oi),
        detail: oi.clone(),
        fatal: false,
    });
    checks.push(Check {
        name: "OPENAI_API_KEY",
        ok: obr_core::env::has_api_key(),
        detail: "required for the cloud reasoning backend".to_string(),
        fatal: false,
    });

    match args.mode {
        Mode::Shell => {}
        Mode::Gui => {
            checks.push(Check {
                name: "DISPLAY",
                ok: obr_core::env::display().is_some(),
                detail: "X11 display for GUI mode".to_string(),
                fatal: true,
            });
            for tool in ["xdotool", "wmctrl", "xwininfo"] {
                checks.push(Check {
                    name: "gui tool",
                    ok: binary_on_path(tool),
                    detail: tool.to_string(),
                    fatal: false,
                });
            }
        }
        Mode::Web => {
            let browser = ["chromium", "chromium-browser", "google-chrome", "chrome"]
                .iter()
                .find(|b| binary_on_path(b));
            checks.push(Check {
                name: "browser binary",
                ok: browser.is_some(),
                detail: browser.map(|b| b.to_string()).unwrap_or_else(|| "none found".to_string()),
                fatal: true,
            });

            let registry = SessionRegistry::new(root.sessions_dir());
            for session in registry.list()?.into_iter().filter(|s| !s.closed) {
                let alive = probe_liveness(&session).await;
                checks.push(Check {
                    name: "session liveness",
                    ok: alive,
                    detail: session.session_id.as_str().to_string(),
                    fatal: false,
                });
            }
        }
    }

    // Crash leftovers: runs that never left `running`.
    let status = StatusIndex::new(root.status_file());
    let stuck = status.stuck_running().unwrap_or_default();
    checks.push(Check {
        name: "no runs stuck in running",
        ok: stuck.is_empty(),
        detail: stuck.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", "),
        fatal: false,
    });

    let mut fatal_failure = false;
    for check in &checks {
        let mark = if check.ok { "ok  " } else { "FAIL" };
        println!("{mark} {:<28} {}", check.name, check.detail);
        if !check.ok && check.fatal {
            fatal_failure = true;
        }
    }

    Ok(if fatal_failure { EXIT_BOOTSTRAP } else { EXIT_OK })
}

fn binary_on_path(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
}
