// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod record;
pub mod route;
pub mod workout;

pub use record::{PendingCounts, Record, RecordKind, SyncReport, SyncState};
pub use route::{LocationPoint, Route, UserProfile};
pub use workout::Workout;
