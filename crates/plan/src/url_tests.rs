// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "http://localhost:5173", Some("http://localhost:5173") },
    trailing_comma = { "http://localhost:5173,", Some("http://localhost:5173") },
    trailing_stack = { "http://localhost:5173).,", Some("http://localhost:5173") },
    quoted = { "\"https://example.com/app\"", Some("https://example.com/app") },
    angle = { "<http://example.com>", Some("http://example.com") },
    path_kept = { "http://example.com/a/b?q=1", Some("http://example.com/a/b?q=1") },
    not_absolute = { "localhost:5173", None },
    empty_host = { "http://", None },
    ftp = { "ftp://example.com", None },
)]
fn normalization(raw: &str, expected: Option<&str>) {
    assert_eq!(normalize_url(raw).as_deref(), expected);
}
