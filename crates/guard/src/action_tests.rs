// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_core::{Mode, RunFlags};
use yare::parameterized;

fn flags() -> RunFlags {
    RunFlags::default()
}

#[parameterized(
    missing_prefix = { "playwright open http://x" },
    empty_command = { "cmd: " },
    whitespace_command = { "cmd:    " },
)]
fn malformed_actions(action: &str) {
    let err = check_action(Mode::Web, &flags(), action).unwrap_err();
    assert_eq!(err.rule(), "malformed_action");
}

#[test]
fn web_mode_permits_only_playwright() {
    assert!(check_action(Mode::Web, &flags(), "cmd: playwright click text:Go").is_ok());
    let err = check_action(Mode::Web, &flags(), "cmd: ls -la").unwrap_err();
    assert_eq!(err.rule(), "not_allowlisted");
}

#[parameterized(
    rm_rf = { "cmd: rm -rf /tmp/x" },
    mkfs = { "cmd: mkfs.ext4 /dev/sda1" },
    dd = { "cmd: dd if=/dev/zero of=/dev/sda" },
    shutdown = { "cmd: shutdown -h now" },
    fork_bomb = { "cmd: :(){:|:&};:" },
)]
fn destructive_commands_rejected(action: &str) {
    let err = check_action(Mode::Shell, &flags(), action).unwrap_err();
    // Fork bomb falls to the denylist before any allowlist question.
    assert!(err.rule() == "destructive" || err.rule() == "not_allowlisted");
    assert_ne!(err.rule(), "malformed_action");
}

#[parameterized(
    vim = { "cmd: vim src/main.rs" },
    sed_inplace = { "cmd: sed -i s/a/b/ config.py" },
    redirect_to_source = { "cmd: echo x > lib/core.rs" },
    git_commit = { "cmd: git commit -m wip" },
)]
fn code_edit_intent_rejected(action: &str) {
    let err = check_action(Mode::Shell, &flags(), action).unwrap_err();
    assert_eq!(err.rule(), "code_edit");
}

#[test]
fn shell_mode_allows_observation_binaries() {
    for action in ["cmd: ls -la", "cmd: cat /proc/meminfo", "cmd: ps aux", "cmd: uname -a"] {
        assert!(check_action(Mode::Shell, &flags(), action).is_ok(), "{action}");
    }
}

#[test]
fn shell_mode_rejects_gui_tools() {
    let err = check_action(Mode::Shell, &flags(), "cmd: xdotool search Music").unwrap_err();
    assert_eq!(err.rule(), "not_allowlisted");
}

#[test]
fn gui_mode_adds_x11_toolbox() {
    assert!(check_action(Mode::Gui, &flags(), "cmd: wmctrl -l").is_ok());
    assert!(check_action(Mode::Gui, &flags(), "cmd: xwininfo -root").is_ok());
    assert!(check_action(Mode::Gui, &flags(), "cmd: import -window root shot.png").is_ok());
}

#[test]
fn gui_coordinate_click_rejected() {
    let err =
        check_action(Mode::Gui, &flags(), "cmd: xdotool mousemove 100 200 click --window 7 1").unwrap_err();
    assert_eq!(err.rule(), "coordinate_click");
}

#[test]
fn gui_click_requires_target_window() {
    let err = check_action(Mode::Gui, &flags(), "cmd: xdotool click 1").unwrap_err();
    assert_eq!(err.rule(), "missing_target_window");
    assert!(check_action(Mode::Gui, &flags(), "cmd: xdotool click --window 0x2a 1").is_ok());
}

#[test]
fn gui_input_injection_requires_confirmation() {
    let err = check_action(Mode::Gui, &flags(), "cmd: xdotool type hola").unwrap_err();
    assert_eq!(err.rule(), "needs_confirmation");

    let confirmed = RunFlags { confirm_sensitive: true, ..RunFlags::default() };
    assert!(check_action(Mode::Gui, &confirmed, "cmd: xdotool type hola").is_ok());
}
