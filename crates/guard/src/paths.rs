// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence-path containment.
//!
//! Every path the report references must resolve inside the run
//! directory after symlink resolution. Paths that do not exist yet are
//! resolved lexically and rejected on any `..` component.

use crate::action::GuardViolation;
use std::path::{Component, Path, PathBuf};

/// Canonicalise a candidate evidence path and require containment in
/// `run_dir`. Relative candidates resolve against the run dir.
pub fn check_evidence_path(run_dir: &Path, candidate: &str) -> Result<PathBuf, GuardViolation> {
    let escape = || GuardViolation::EvidenceEscape(candidate.to_string());

    let joined = {
        let p = Path::new(candidate);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            run_dir.join(p)
        }
    };

    let run_dir_real = run_dir.canonicalize().unwrap_or_else(|_| run_dir.to_path_buf());

    // Existing files: resolve symlinks and compare real paths.
    if let Ok(real) = joined.canonicalize() {
        if real.starts_with(&run_dir_real) {
            return Ok(real);
        }
        return Err(escape());
    }

    // Not on disk yet: lexical resolution, rejecting any parent-dir hop.
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => return Err(escape()),
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    if resolved.starts_with(&run_dir_real) || resolved.starts_with(run_dir) {
        Ok(resolved)
    } else {
        Err(escape())
    }
}

/// Predicate form used by the report normaliser.
pub fn evidence_path_ok(run_dir: &Path, candidate: &str) -> bool {
    check_evidence_path(run_dir, candidate).is_ok()
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
