// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Syncable record envelope shared by all entity kinds.

use crate::models::{Route, Workout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate a client-side record ID (UUIDv4).
pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether a record is confirmed present on the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Exists locally, not yet confirmed remotely
    #[default]
    Pending,
    /// Confirmed remotely as of the last successful push
    Synced,
}

impl SyncState {
    pub fn is_synced(self) -> bool {
        self == SyncState::Synced
    }
}

/// Entity kinds the engine syncs independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Workout,
    Route,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Workout => "workout",
            RecordKind::Route => "route",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally stored record of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Workout(Workout),
    Route(Route),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Workout(w) => &w.id,
            Record::Route(r) => &r.id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Record::Workout(w) => &w.owner_id,
            Record::Route(r) => &r.owner_id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Workout(_) => RecordKind::Workout,
            Record::Route(_) => RecordKind::Route,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Workout(w) => w.created_at,
            Record::Route(r) => r.created_at,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        match self {
            Record::Workout(w) => w.sync_state,
            Record::Route(r) => r.sync_state,
        }
    }

    /// Searchable name: activity type for workouts, route name for routes.
    pub fn label(&self) -> &str {
        match self {
            Record::Workout(w) => &w.activity_type,
            Record::Route(r) => &r.route_name,
        }
    }
}

impl From<Workout> for Record {
    fn from(workout: Workout) -> Self {
        Record::Workout(workout)
    }
}

impl From<Route> for Record {
    fn from(route: Route) -> Self {
        Record::Route(route)
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub workouts_synced: u32,
    pub routes_synced: u32,
    /// Records attempted this pass but left Pending
    pub failed: u32,
    /// Records never attempted because the pass was cancelled
    pub remaining: u32,
}

impl SyncReport {
    pub fn total_synced(&self) -> u32 {
        self.workouts_synced + self.routes_synced
    }

    /// True when every Pending record was pushed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.remaining == 0
    }

    /// True when cancellation stopped the pass before every record was tried.
    pub fn was_cut_short(&self) -> bool {
        self.remaining > 0
    }

    pub fn synced_for(&self, kind: RecordKind) -> u32 {
        match kind {
            RecordKind::Workout => self.workouts_synced,
            RecordKind::Route => self.routes_synced,
        }
    }

    pub(crate) fn record_success(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Workout => self.workouts_synced += 1,
            RecordKind::Route => self.routes_synced += 1,
        }
    }
}

/// Pending records per kind, for "N items pending sync".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub workouts: u32,
    pub routes: u32,
}

impl PendingCounts {
    pub fn total(&self) -> u32 {
        self.workouts + self.routes
    }
}
