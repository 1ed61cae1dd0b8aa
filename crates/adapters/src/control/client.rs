// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the loopback control agent.
//!
//! Sends HTTP/1.1 requests over TCP. Reads responses using
//! Content-Length framing (does not depend on connection close for EOF).

use super::ControlError;
use obr_core::{ActionOutcome, ControlAction, ObserverEvent, StateSnapshot};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Overall budget for connect + write + read. Prevents hangs when the
/// agent accepts the connection but never answers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn agent_get(port: u16, path: &str) -> Result<String, ControlError> {
    let request = format!("GET {path} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\n\r\n");
    timed_request(port, &request).await
}

pub async fn agent_post(port: u16, path: &str, body: &str) -> Result<String, ControlError> {
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len(),
    );
    timed_request(port, &request).await
}

/// Probe the agent: `GET /state`, decoded. `Offline` on connect failure.
pub async fn probe_agent(port: u16) -> Result<StateSnapshot, ControlError> {
    let body = match agent_get(port, "/state").await {
        Ok(body) => body,
        Err(ControlError::Io(_)) | Err(ControlError::Timeout) => return Err(ControlError::Offline),
        Err(e) => return Err(e),
    };
    Ok(serde_json::from_str(&body)?)
}

pub async fn send_action(port: u16, action: ControlAction) -> Result<ActionOutcome, ControlError> {
    let body = agent_post(port, "/action", &serde_json::to_string(&action)?).await?;
    Ok(serde_json::from_str(&body)?)
}

pub async fn send_event(port: u16, event: &ObserverEvent) -> Result<(), ControlError> {
    agent_post(port, "/event", &serde_json::to_string(event)?).await?;
    Ok(())
}

async fn timed_request(port: u16, request: &str) -> Result<String, ControlError> {
    tokio::time::timeout(REQUEST_TIMEOUT, send_request(port, request))
        .await
        .map_err(|_| ControlError::Timeout)?
}

async fn send_request(port: u16, request: &str) -> Result<String, ControlError> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    stream.write_all(request.as_bytes()).await?;

    let mut reader = BufReader::new(&mut stream);
    read_http_response(&mut reader).await
}

/// Read and parse an HTTP/1.1 response from a buffered stream.
async fn read_http_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<String, ControlError> {
    let mut status_line = String::new();
    reader.read_line(&mut status_line).await?;
    let status_code =
        status_line.split_whitespace().nth(1).and_then(|s| s.parse::<u16>().ok()).unwrap_or(0);

    // Read headers, extract Content-Length (case-insensitive)
    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let line_lower = line.to_ascii_lowercase();
        if let Some(val) = line_lower.strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }

    let body = if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).await?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        String::new()
    };

    if status_code >= 400 {
        return Err(ControlError::Http { status: status_code, body: body.trim().to_string() });
    }

    Ok(body)
}
