// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync error types shared by the stores and the engine.

use std::time::Duration;

/// Error type for local storage, remote calls and sync passes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store not reachable")]
    Offline,

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl SyncError {
    /// True for outcomes that are a normal quiescent state and must not be
    /// shown to the user (offline short-circuit, host teardown).
    pub fn is_quiet(&self) -> bool {
        matches!(self, SyncError::Offline | SyncError::Cancelled)
    }

    /// True for per-record remote failures; the record stays Pending.
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable(_) | SyncError::Timeout(_))
    }

    /// True for local storage failures, the only alarming kind.
    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Storage(format!("Payload encoding error: {}", err))
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
