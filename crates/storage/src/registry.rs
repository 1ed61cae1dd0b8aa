// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: `runs/web_sessions/<id>.json`.
//!
//! Updates are whole-file atomic rewrites under a per-session file lock.
//! Liveness is decided by callers (process + devtools + agent probes);
//! the registry only records the verdict.

use crate::atomic::{atomic_write_json, read_json, with_file_lock};
use crate::StorageError;
use obr_core::{WebSession, WebSessionId};
use std::fs;
use std::path::PathBuf;

/// Handle to the on-disk session registry.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    dir: PathBuf,
}

impl SessionRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file(&self, id: &WebSessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    pub fn load(&self, id: &WebSessionId) -> Result<WebSession, StorageError> {
        read_json(&self.file(id))?
            .ok_or_else(|| StorageError::SessionNotFound(id.as_str().to_string()))
    }

    pub fn save(&self, session: &WebSession) -> Result<(), StorageError> {
        let path = self.file(&session.session_id);
        with_file_lock(&path, || atomic_write_json(&path, session))
    }

    /// Read-modify-write a session under its lock.
    pub fn update(
        &self,
        id: &WebSessionId,
        f: impl FnOnce(&mut WebSession),
    ) -> Result<WebSession, StorageError> {
        let path = self.file(id);
        with_file_lock(&path, || {
            let mut session: WebSession = read_json(&path)?
                .ok_or_else(|| StorageError::SessionNotFound(id.as_str().to_string()))?;
            f(&mut session);
            atomic_write_json(&path, &session)?;
            tracing::debug!(session_id = %session.session_id, "session record updated");
            Ok(session)
        })
    }

    pub fn delete(&self, id: &WebSessionId) -> Result<(), StorageError> {
        match fs::remove_file(self.file(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All registered sessions, sorted by creation time.
    pub fn list(&self) -> Result<Vec<WebSession>, StorageError> {
        let mut sessions = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(session) = read_json::<WebSession>(&path)? {
                    sessions.push(session);
                }
            }
        }
        sessions.sort_by_key(|s| s.created_at_ms);
        Ok(sessions)
    }

    /// The most recently created live session, for `--attach last`.
    pub fn last(&self) -> Result<Option<WebSession>, StorageError> {
        Ok(self.list()?.into_iter().filter(|s| !s.closed).next_back())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
