// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Vitality-Sync: offline-first sync of workouts and GPS routes
//!
//! Records are written to an on-device SQLite store first and pushed to
//! Firestore whenever the network allows. The local store is the source of
//! truth; each record carries a Pending/Synced flag that only flips after
//! the remote confirms the write.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

pub use error::{Result, SyncError};
pub use services::SyncEngine;
