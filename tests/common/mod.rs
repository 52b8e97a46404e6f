// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vitality_sync::db::{FirestoreRemote, LocalStore, RemoteStore, SqliteStore};
use vitality_sync::models::{LocationPoint, Record, RecordKind, Route, UserProfile, Workout};
use vitality_sync::services::{ManualOracle, SyncConfig, SyncEngine};
use vitality_sync::{Result, SyncError};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a Firestore connection against the emulator.
#[allow(dead_code)]
pub async fn test_remote() -> FirestoreRemote {
    FirestoreRemote::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fakes ───────────────────────────────────────────────────────

/// In-memory remote store that records every call.
///
/// Upserts for IDs in `failing_ids` fail; an optional delay widens the
/// window in which two pushes of the same ID could overlap, and any overlap
/// is counted.
#[derive(Default)]
pub struct InstrumentedRemote {
    docs: Mutex<HashMap<String, Record>>,
    failing_ids: Mutex<HashSet<String>>,
    in_flight: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    delay: Duration,
    fail_deletes: AtomicBool,
    upsert_calls: AtomicUsize,
    overlaps: AtomicUsize,
}

#[allow(dead_code)]
impl InstrumentedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn fail_on(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn heal(&self) {
        self.failing_ids.lock().unwrap().clear();
        self.fail_deletes.store(false, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.lock().unwrap().contains_key(id)
    }

    pub fn doc(&self, id: &str) -> Option<Record> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// IDs whose upsert has started but not returned.
    pub fn in_flight_ids(&self) -> Vec<String> {
        self.in_flight.lock().unwrap().iter().cloned().collect()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for InstrumentedRemote {
    async fn upsert(&self, record: &Record) -> Result<()> {
        let id = record.id().to_string();
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let entered = self.in_flight.lock().unwrap().insert(id.clone());
        if !entered {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = if self.failing_ids.lock().unwrap().contains(&id) {
            Err(SyncError::RemoteUnavailable("injected failure".to_string()))
        } else {
            self.docs.lock().unwrap().insert(id.clone(), record.clone());
            Ok(())
        };

        if entered {
            self.in_flight.lock().unwrap().remove(&id);
        }
        result
    }

    async fn delete(&self, _kind: RecordKind, id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteUnavailable("injected delete failure".to_string()));
        }
        self.docs.lock().unwrap().remove(id);
        Ok(())
    }
}

/// Local store whose disk is gone: every call fails.
#[allow(dead_code)]
pub struct BrokenStore;

#[async_trait]
impl LocalStore for BrokenStore {
    async fn insert(&self, _record: &Record) -> Result<()> {
        Err(SyncError::Storage("disk I/O error".to_string()))
    }

    async fn get(&self, _id: &str) -> Result<Option<Record>> {
        Err(SyncError::Storage("disk I/O error".to_string()))
    }

    async fn list_by_owner(&self, _owner_id: &str) -> Result<Vec<Record>> {
        Err(SyncError::Storage("disk I/O error".to_string()))
    }

    async fn list_unsynced(&self) -> Result<Vec<Record>> {
        Err(SyncError::Storage("database disk image is malformed".to_string()))
    }

    async fn mark_synced(&self, _id: &str) -> Result<()> {
        Err(SyncError::Storage("disk I/O error".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Err(SyncError::Storage("disk I/O error".to_string()))
    }

    async fn search(&self, _owner_id: &str, _query: &str) -> Result<Vec<Record>> {
        Err(SyncError::Storage("disk I/O error".to_string()))
    }
}

// ─── Fixtures ────────────────────────────────────────────────────

/// Engine wired to an in-memory SQLite store, the given remote and oracle.
#[allow(dead_code)]
pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub local: Arc<SqliteStore>,
    pub remote: Arc<InstrumentedRemote>,
    pub oracle: Arc<ManualOracle>,
}

#[allow(dead_code)]
pub fn harness(remote: InstrumentedRemote, reachable: bool) -> Harness {
    harness_with_config(remote, reachable, SyncConfig::default())
}

#[allow(dead_code)]
pub fn harness_with_config(
    remote: InstrumentedRemote,
    reachable: bool,
    config: SyncConfig,
) -> Harness {
    let local = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    let remote = Arc::new(remote);
    let oracle = Arc::new(ManualOracle::new(reachable));
    let engine = Arc::new(SyncEngine::new(
        local.clone(),
        remote.clone(),
        oracle.clone(),
        config,
    ));

    Harness {
        engine,
        local,
        remote,
        oracle,
    }
}

/// Helper to create a Pending workout.
#[allow(dead_code)]
pub fn test_workout(owner_id: &str, activity_type: &str) -> Workout {
    Workout::new(owner_id, activity_type, "30 min", "Medium", 100, Utc::now())
        .expect("valid workout")
}

/// Helper to create a Pending route with a short two-point track.
#[allow(dead_code)]
pub fn test_route(owner_id: &str, route_name: &str) -> Route {
    let points = vec![
        LocationPoint {
            latitude: 37.3318,
            longitude: -122.0312,
            timestamp: 1_700_000_000_000,
        },
        LocationPoint {
            latitude: 37.3402,
            longitude: -122.0312,
            timestamp: 1_700_000_360_000,
        },
    ];
    Route::from_tracking(owner_id, route_name, points, 360_000, &UserProfile::default())
        .expect("valid route")
}

/// Insert records directly into the local store (no push).
#[allow(dead_code)]
pub async fn seed(local: &SqliteStore, records: Vec<Record>) {
    for record in records {
        local.insert(&record).await.expect("seed insert");
    }
}
