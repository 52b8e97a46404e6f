// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: the on-device SQLite store and the Firestore remote.
//!
//! The engine only sees the [`LocalStore`] and [`RemoteStore`] traits, so
//! either side can be swapped for a fake in tests.

pub mod firestore;
pub mod sqlite;

pub use firestore::FirestoreRemote;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{Record, RecordKind};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    use crate::models::RecordKind;

    pub const WORKOUTS: &str = "workouts";
    pub const ROUTES: &str = "routes";

    /// Remote collection holding records of `kind`.
    pub fn for_kind(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Workout => WORKOUTS,
            RecordKind::Route => ROUTES,
        }
    }
}

/// Durable on-device record storage, the source of truth while offline.
///
/// Every mutation touches a single record and is atomic on its own.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Create or replace a record by ID.
    async fn insert(&self, record: &Record) -> Result<()>;

    /// Look up a record of any kind by ID.
    async fn get(&self, id: &str) -> Result<Option<Record>>;

    /// All records of an owner, newest-created first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Record>>;

    /// All Pending records across every owner, in no particular order.
    async fn list_unsynced(&self) -> Result<Vec<Record>>;

    /// Flip a record to Synced. Absent or already-Synced IDs are a no-op.
    async fn mark_synced(&self, id: &str) -> Result<()>;

    /// Remove a record. Absent IDs are a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Owner's records whose label contains `query`, ignoring case.
    async fn search(&self, owner_id: &str, query: &str) -> Result<Vec<Record>>;
}

/// Network record storage, authoritative once reachable.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create or fully replace the remote copy keyed by the record ID.
    async fn upsert(&self, record: &Record) -> Result<()>;

    /// Delete the remote copy. Deleting an absent document succeeds.
    async fn delete(&self, kind: RecordKind, id: &str) -> Result<()>;
}
