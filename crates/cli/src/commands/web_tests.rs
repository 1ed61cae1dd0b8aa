// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_core::WebSession;

fn registry_with(sessions: Vec<WebSession>) -> (tempfile::TempDir, SessionRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let registry = SessionRegistry::new(dir.path().join("web_sessions"));
    for s in sessions {
        registry.save(&s).unwrap();
    }
    (dir, registry)
}

fn session(id: &str, created_at_ms: u64, closed: bool) -> WebSession {
    let mut s = WebSession::new(
        WebSessionId::from_string(id),
        1,
        "ws://127.0.0.1:1/devtools/browser/x".to_string(),
        1,
        created_at_ms,
    );
    s.closed = closed;
    s
}

#[test]
fn explicit_id_resolves_verbatim() {
    let (_dir, registry) = registry_with(vec![]);
    let id = resolve_session(&registry, "web-abc").unwrap();
    assert_eq!(id.as_str(), "web-abc");
}

#[test]
fn last_resolves_newest_live_session() {
    let (_dir, registry) = registry_with(vec![
        session("web-old", 100, false),
        session("web-new", 200, false),
        session("web-dead", 300, true),
    ]);
    let id = resolve_session(&registry, "last").unwrap();
    assert_eq!(id.as_str(), "web-new");
}

#[test]
fn last_with_no_live_sessions_is_invalid_args() {
    let (_dir, registry) = registry_with(vec![session("web-dead", 100, true)]);
    let err = resolve_session(&registry, "last").unwrap_err();
    assert_eq!(err.code, crate::EXIT_INVALID_ARGS);
}
