// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Learned selectors and context keys.
//!
//! The learning store is append-merge: `success_count` never decreases,
//! and a selector that stops resolving is demoted to fallback rank rather
//! than erased.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of consecutive resolution failures after which a learned
/// selector drops to fallback rank.
pub const DEMOTE_AFTER_FAILURES: u32 = 2;

/// Stable identifier for a screen/state, used to index learned selectors.
///
/// Hash of the origin host plus a screen signature (heading text and
/// primary landmarks), hex-truncated to 16 characters.
pub fn context_key(origin_host: &str, screen_signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin_host.as_bytes());
    hasher.update([0]);
    hasher.update(screen_signature.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// A selector learned from manual user activity during a teaching handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedSelector {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_text: Option<String>,
    /// Scroll positions to replay before retrying: container first, then page.
    #[serde(default)]
    pub scroll_hints: Vec<ScrollHint>,
    #[serde(default)]
    pub success_count: u32,
    /// Consecutive times the selector failed to resolve. Reset on success.
    #[serde(default)]
    pub failure_streak: u32,
    #[serde(default)]
    pub last_used_at: u64,
}

impl LearnedSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            fallback_text: None,
            scroll_hints: Vec::new(),
            success_count: 0,
            failure_streak: 0,
            last_used_at: 0,
        }
    }

    /// Whether this selector has been demoted to fallback rank.
    pub fn demoted(&self) -> bool {
        self.failure_streak >= DEMOTE_AFTER_FAILURES
    }

    pub fn record_success(&mut self, epoch_ms: u64) {
        self.success_count += 1;
        self.failure_streak = 0;
        self.last_used_at = epoch_ms;
    }

    pub fn record_failure(&mut self) {
        self.failure_streak += 1;
    }
}

/// A scroll position hint captured alongside a learned selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollHint {
    /// Selector of the scroll container; empty means the page itself.
    #[serde(default)]
    pub container: String,
    pub top: i64,
}

/// Raw capture of a useful manual click during a learning window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeachingCapture {
    pub selector: String,
    #[serde(default)]
    pub text: String,
    pub url: String,
    pub context_key: String,
    #[serde(default)]
    pub scroll_hints: Vec<ScrollHint>,
    pub timestamp: u64,
}

#[cfg(test)]
#[path = "learning_tests.rs"]
mod tests;
