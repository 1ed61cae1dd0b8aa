// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn context_key_is_stable_and_host_scoped() {
    let a = context_key("localhost:5173", "catalog");
    let b = context_key("localhost:5173", "catalog");
    let c = context_key("localhost:5173", "player");
    let d = context_key("other.host", "catalog");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_eq!(a.len(), 16);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn success_resets_failure_streak() {
    let mut sel = LearnedSelector::new("#player-stop-btn");
    sel.record_failure();
    sel.record_failure();
    assert!(sel.demoted());
    sel.record_success(5_000);
    assert!(!sel.demoted());
    assert_eq!(sel.success_count, 1);
    assert_eq!(sel.last_used_at, 5_000);
}

#[test]
fn demotion_requires_two_consecutive_failures() {
    let mut sel = LearnedSelector::new("#btn");
    sel.record_failure();
    assert!(!sel.demoted());
    sel.record_failure();
    assert!(sel.demoted());
}

#[test]
fn capture_roundtrip() {
    let capture = TeachingCapture {
        selector: "#player-stop-btn".into(),
        text: "Stop".into(),
        url: "http://localhost:5173/catalog".into(),
        context_key: context_key("localhost:5173", "catalog"),
        scroll_hints: vec![ScrollHint { container: ".list".into(), top: 420 }],
        timestamp: 9_000,
    };
    let json = serde_json::to_string(&capture).unwrap();
    let back: TeachingCapture = serde_json::from_str(&json).unwrap();
    assert_eq!(back, capture);
}
