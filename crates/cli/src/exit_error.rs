// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(crate::EXIT_INVALID_ARGS, message)
    }

    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::new(crate::EXIT_BOOTSTRAP, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<obr_storage::StorageError> for ExitError {
    fn from(e: obr_storage::StorageError) -> Self {
        Self::new(crate::EXIT_BOOTSTRAP, e.to_string())
    }
}

impl From<obr_engine::EngineError> for ExitError {
    fn from(e: obr_engine::EngineError) -> Self {
        Self::new(crate::EXIT_BOOTSTRAP, e.to_string())
    }
}
