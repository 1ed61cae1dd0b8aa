// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn devtools_line_parses() {
    let line = "DevTools listening on ws://127.0.0.1:39541/devtools/browser/6b2a-44c1";
    let cap = devtools_line_re().captures(line).unwrap();
    assert_eq!(&cap[1], "ws://127.0.0.1:39541/devtools/browser/6b2a-44c1");
}

#[test]
fn unrelated_stderr_lines_do_not_match() {
    for line in ["[WARNING] gpu init failed", "DevTools listening soon", ""] {
        assert!(devtools_line_re().captures(line).is_none(), "{line}");
    }
}

#[test]
fn pid_alive_detects_current_process() {
    assert!(pid_alive(std::process::id()));
}

#[test]
fn pid_alive_detects_reaped_child() {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn ephemeral_ports_are_distinct_enough() {
    let a = ephemeral_port().await.unwrap();
    let b = ephemeral_port().await.unwrap();
    assert!(a > 0 && b > 0);
}
