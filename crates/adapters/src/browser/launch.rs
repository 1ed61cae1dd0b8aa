// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chromium launch with a devtools endpoint.
//!
//! The endpoint is read from the `DevTools listening on ws://…` stderr
//! line; if that never arrives, `/json/version` on the chosen port is
//! polled as a fallback.

use super::BrowserError;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};

/// Browser binaries tried in order.
const BROWSER_BINARIES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// A launched browser process and its devtools endpoint.
pub struct BrowserHandle {
    pub pid: u32,
    pub cdp_endpoint: String,
    pub child: Child,
}

fn devtools_line_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"DevTools listening on (ws://\S+)").expect("static pattern")
    })
}

/// Launch a browser with remote debugging on an ephemeral loopback port.
pub async fn launch_browser(
    profile_dir: &Path,
    headed: bool,
    deadline: Duration,
) -> Result<BrowserHandle, BrowserError> {
    let port = ephemeral_port().await?;

    let mut last_err = String::from("no browser binary found");
    for binary in BROWSER_BINARIES {
        match spawn_browser(binary, profile_dir, headed, port).await {
            Ok(mut child) => {
                let pid = child
                    .id()
                    .ok_or_else(|| BrowserError::Launch("browser exited at spawn".to_string()))?;
                let endpoint = wait_for_endpoint(&mut child, port, deadline).await?;
                tracing::info!(pid, %endpoint, "browser launched");
                return Ok(BrowserHandle { pid, cdp_endpoint: endpoint, child });
            }
            Err(e) => last_err = format!("{binary}: {e}"),
        }
    }
    Err(BrowserError::Launch(last_err))
}

async fn spawn_browser(
    binary: &str,
    profile_dir: &Path,
    headed: bool,
    port: u16,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(binary);
    cmd.arg(format!("--remote-debugging-port={port}"))
        .arg(format!("--user-data-dir={}", profile_dir.display()))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    if !headed {
        cmd.arg("--headless=new");
    }
    cmd.spawn()
}

/// Reserve a free loopback port by binding and releasing it.
async fn ephemeral_port() -> Result<u16, BrowserError> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}

async fn wait_for_endpoint(
    child: &mut Child,
    port: u16,
    deadline: Duration,
) -> Result<String, BrowserError> {
    let stderr = child.stderr.take();

    let scan = async {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(cap) = devtools_line_re().captures(&line) {
                    return Some(cap[1].to_string());
                }
            }
        }
        None
    };

    let endpoint = tokio::time::timeout(deadline, scan).await;
    if let Ok(Some(endpoint)) = endpoint {
        return Ok(endpoint);
    }

    // Stderr never produced the line (or was consumed elsewhere): ask the
    // debug port directly.
    poll_json_version(port, deadline).await
}

/// Poll `GET /json/version` until the browser answers with its websocket
/// debugger URL.
pub async fn poll_json_version(port: u16, deadline: Duration) -> Result<String, BrowserError> {
    let attempt = async {
        loop {
            if let Some(url) = fetch_ws_url(port).await {
                return url;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    };
    tokio::time::timeout(deadline, attempt)
        .await
        .map_err(|_| BrowserError::Timeout("devtools endpoint discovery"))
}

async fn fetch_ws_url(port: u16) -> Option<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.ok()?;
    let request = format!("GET /json/version HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await.ok()?;
    let body = response.split("\r\n\r\n").nth(1)?;
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    value
        .get("webSocketDebuggerUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Whether a process is still alive (null-signal probe).
pub fn pid_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

/// Ask a process to terminate (SIGTERM, best effort).
pub fn terminate_pid(pid: u32) {
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGTERM,
    );
}

#[cfg(test)]
#[path = "launch_tests.rs"]
mod tests;
