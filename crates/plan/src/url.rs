// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL extraction and normalisation.

/// Trailing characters stripped from an extracted URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Strip trailing punctuation and matched quotes from a URL candidate.
///
/// Returns `None` when the remainder is not a valid absolute http(s) URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = raw.trim();

    // Matched surrounding quotes first, then trailing punctuation, until
    // a pass changes nothing.
    loop {
        let before = url;
        for (open, close) in [('"', '"'), ('\'', '\''), ('<', '>'), ('(', ')')] {
            if url.len() >= 2 && url.starts_with(open) && url.ends_with(close) {
                url = &url[1..url.len() - 1];
            }
        }
        url = url.trim_end_matches(TRAILING_PUNCTUATION);
        url = url.trim_end_matches('"').trim_end_matches('\'');
        if url == before {
            break;
        }
    }

    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }
    Some(url.to_string())
}

#[cfg(test)]
#[path = "url_tests.rs"]
mod tests;
