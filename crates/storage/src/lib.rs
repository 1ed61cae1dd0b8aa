// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! obr-storage: on-disk state for runs, sessions, and learning.
//!
//! All global mutable files (session registry, learning store, status
//! index) are whole-file atomic rewrites under an advisory file lock.
//! Nothing here is an in-memory singleton; the disk is the single source
//! of truth.

mod atomic;
mod layout;
mod learning_store;
mod registry;
mod status;

pub use atomic::{atomic_write_json, read_json, rotate_bak_path};
pub use layout::{RunPaths, RunsRoot};
pub use learning_store::LearningStore;
pub use registry::SessionRegistry;
pub use status::{StatusEntry, StatusIndex};

use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("run already finalised: {0}")]
    AlreadyFinalised(String),
}
