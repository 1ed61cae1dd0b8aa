// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global learning store: `runs/learning/web_teaching_selectors.json`.
//!
//! Append-merge semantics: `success_count` never decreases, and a
//! selector that stops resolving is demoted to fallback rank instead of
//! erased. Among equal success counts, insertion order ranks first.

use crate::atomic::{atomic_write_json, read_json, rotate_bak_path, with_file_lock};
use crate::StorageError;
use obr_core::{LearnedSelector, TeachingCapture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// On-disk shape: context key → ordered learned selectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub contexts: BTreeMap<String, Vec<LearnedSelector>>,
}

/// Handle to the global learning store.
#[derive(Debug, Clone)]
pub struct LearningStore {
    path: PathBuf,
}

impl LearningStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<StoreFile, StorageError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    /// Selectors for a context, primary rank first.
    ///
    /// Demoted selectors sort behind live ones; within each group the
    /// sort is stable on descending success count, so equal counts keep
    /// insertion order.
    pub fn ranked(&self, context_key: &str) -> Result<Vec<LearnedSelector>, StorageError> {
        let store = self.load()?;
        let mut selectors = store.contexts.get(context_key).cloned().unwrap_or_default();
        selectors.sort_by_key(|s| (s.demoted(), std::cmp::Reverse(s.success_count)));
        Ok(selectors)
    }

    /// Merge a teaching capture into the store.
    ///
    /// A new selector is appended; an existing one replaces its scroll
    /// hints only when the capture carries any, and gains a success.
    pub fn merge_capture(&self, capture: &TeachingCapture) -> Result<(), StorageError> {
        self.mutate(|store| {
            let selectors = store.contexts.entry(capture.context_key.clone()).or_default();
            if let Some(existing) = selectors.iter_mut().find(|s| s.selector == capture.selector) {
                existing.record_success(capture.timestamp);
                if !capture.scroll_hints.is_empty() {
                    existing.scroll_hints = capture.scroll_hints.clone();
                }
                if existing.fallback_text.is_none() && !capture.text.is_empty() {
                    existing.fallback_text = Some(capture.text.clone());
                }
            } else {
                let mut learned = LearnedSelector::new(capture.selector.clone());
                learned.fallback_text =
                    (!capture.text.is_empty()).then(|| capture.text.clone());
                learned.scroll_hints = capture.scroll_hints.clone();
                learned.record_success(capture.timestamp);
                selectors.push(learned);
            }
        })
    }

    /// Record that a learned selector resolved and worked.
    pub fn record_success(
        &self,
        context_key: &str,
        selector: &str,
        epoch_ms: u64,
    ) -> Result<(), StorageError> {
        self.mutate(|store| {
            if let Some(selectors) = store.contexts.get_mut(context_key) {
                if let Some(s) = selectors.iter_mut().find(|s| s.selector == selector) {
                    s.record_success(epoch_ms);
                }
            }
        })
    }

    /// Record that a learned selector failed to resolve.
    pub fn record_failure(&self, context_key: &str, selector: &str) -> Result<(), StorageError> {
        self.mutate(|store| {
            if let Some(selectors) = store.contexts.get_mut(context_key) {
                if let Some(s) = selectors.iter_mut().find(|s| s.selector == selector) {
                    s.record_failure();
                }
            }
        })
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreFile)) -> Result<(), StorageError> {
        with_file_lock(&self.path, || {
            let mut store: StoreFile = read_json(&self.path)?.unwrap_or_default();
            f(&mut store);
            // Keep a backup of the previous generation before rewriting.
            if self.path.exists() {
                let bak = rotate_bak_path(&self.path);
                let _ = fs::copy(&self.path, bak);
            }
            tracing::debug!(contexts = store.contexts.len(), "learning store rewritten");
            atomic_write_json(&self.path, &store)
        })
    }
}

#[cfg(test)]
#[path = "learning_store_tests.rs"]
mod tests;
