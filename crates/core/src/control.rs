// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control state and the control-agent wire types.
//!
//! The control color is a pure function of the session booleans; it is
//! recomputed on every transition and must never be cached.

use serde::{Deserialize, Serialize};

/// Overlay/top-bar color communicating who is in control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlColor {
    Blue,
    Orange,
    Red,
    Green,
    Gray,
}

crate::simple_display! {
    ControlColor {
        Blue => "blue",
        Orange => "orange",
        Red => "red",
        Green => "green",
        Gray => "gray",
    }
}

impl ControlColor {
    /// Derive the color from session booleans. Exactly one applies;
    /// first match wins: red, orange, blue, green, gray.
    pub fn derive(
        controlled: bool,
        learning_active: bool,
        incident_open: bool,
        agent_online: bool,
    ) -> Self {
        if incident_open {
            ControlColor::Red
        } else if learning_active {
            ControlColor::Orange
        } else if controlled {
            ControlColor::Blue
        } else if agent_online {
            ControlColor::Green
        } else {
            ControlColor::Gray
        }
    }
}

/// Derived control state shown by the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub color: ControlColor,
    pub label: String,
}

impl ControlState {
    pub fn derive(
        controlled: bool,
        learning_active: bool,
        incident_open: bool,
        agent_online: bool,
    ) -> Self {
        let color = ControlColor::derive(controlled, learning_active, incident_open, agent_online);
        let label = match color {
            ControlColor::Red => "INCIDENT",
            ControlColor::Orange => "USER CONTROL",
            ControlColor::Blue => "ASSISTANT CONTROL",
            ControlColor::Green => "IDLE",
            ControlColor::Gray => "OFFLINE",
        };
        Self { color, label: label.to_string() }
    }

    /// The overlay is installed only while one of the active booleans holds.
    pub fn overlay_required(controlled: bool, learning_active: bool, incident_open: bool) -> bool {
        controlled || learning_active || incident_open
    }
}

/// Snapshot returned by `GET /state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub session_id: String,
    pub url: String,
    pub title: String,
    pub controlled: bool,
    pub learning_active: bool,
    pub incident_open: bool,
    pub ack_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ack_at: Option<u64>,
    pub agent_online: bool,
}

impl StateSnapshot {
    pub fn control_state(&self) -> ControlState {
        ControlState::derive(
            self.controlled,
            self.learning_active,
            self.incident_open,
            self.agent_online,
        )
    }
}

/// Observer event channels accepted by `POST /event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    Click,
    ConsoleError,
    PageError,
    NetworkError,
    ManualClick,
    Scroll,
    Mousemove,
}

crate::simple_display! {
    ObserverKind {
        Click => "click",
        ConsoleError => "console_error",
        PageError => "page_error",
        NetworkError => "network_error",
        ManualClick => "manual_click",
        Scroll => "scroll",
        Mousemove => "mousemove",
    }
}

/// Body of `POST /event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverEvent {
    pub kind: ObserverKind,
    /// Step index current at capture time.
    pub step: usize,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub ts: u64,
}

/// Body of `POST /action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum ControlAction {
    Refresh,
    Release,
    Close,
    Ack,
}

crate::simple_display! {
    ControlAction {
        Refresh => "refresh",
        Release => "release",
        Close => "close",
        Ack => "ack",
    }
}

/// Response to `POST /action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub state: StateSnapshot,
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
