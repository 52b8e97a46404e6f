// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite-backed local store.
//!
//! Workouts and routes live in separate tables keyed by their client-side
//! ID, each with a `synced` flag. Route points are stored as a JSON array.

use crate::db::LocalStore;
use crate::error::{Result, SyncError};
use crate::models::{LocationPoint, Record, Route, SyncState, Workout};
use crate::time_utils::{from_millis, to_millis};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::Mutex;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workouts (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    duration TEXT NOT NULL,
    intensity TEXT NOT NULL,
    completion_percentage INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_workouts_owner ON workouts (owner_id, created_at);
CREATE INDEX IF NOT EXISTS idx_workouts_synced ON workouts (synced);

CREATE TABLE IF NOT EXISTS routes (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    route_name TEXT NOT NULL,
    distance_km REAL NOT NULL,
    duration_ms INTEGER NOT NULL,
    average_pace REAL NOT NULL,
    estimated_heart_rate INTEGER NOT NULL,
    calories_burnt REAL NOT NULL,
    path_points TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_routes_owner ON routes (owner_id, created_at);
CREATE INDEX IF NOT EXISTS idx_routes_synced ON routes (synced);
";

const WORKOUT_COLUMNS: &str = "id, owner_id, activity_type, duration, intensity, \
     completion_percentage, timestamp, created_at, synced";

const ROUTE_COLUMNS: &str = "id, owner_id, route_name, distance_km, duration_ms, average_pace, \
     estimated_heart_rate, calories_burnt, path_points, timestamp, created_at, synced";

/// SQLite local store. A single connection serializes all access.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn)
    }

    /// Open a private in-memory database (tests and ephemeral hosts).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(SyncError::Storage(format!(
                "Database schema version {} is newer than supported {}",
                version, SCHEMA_VERSION
            )));
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        tracing::debug!(schema_version = SCHEMA_VERSION, "Local store ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert_workout(conn: &Connection, workout: &Workout) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO workouts (
                id, owner_id, activity_type, duration, intensity,
                completion_percentage, timestamp, created_at, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                workout.id,
                workout.owner_id,
                workout.activity_type,
                workout.duration,
                workout.intensity,
                workout.completion_percentage,
                to_millis(workout.timestamp),
                to_millis(workout.created_at),
                workout.sync_state.is_synced(),
            ],
        )?;
        Ok(())
    }

    fn insert_route(conn: &Connection, route: &Route) -> Result<()> {
        let path_points = serde_json::to_string(&route.path_points)?;
        conn.execute(
            "INSERT OR REPLACE INTO routes (
                id, owner_id, route_name, distance_km, duration_ms, average_pace,
                estimated_heart_rate, calories_burnt, path_points, timestamp,
                created_at, synced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                route.id,
                route.owner_id,
                route.route_name,
                route.distance_km,
                route.duration_ms as i64,
                route.average_pace,
                route.estimated_heart_rate,
                route.calories_burnt,
                path_points,
                to_millis(route.timestamp),
                to_millis(route.created_at),
                route.sync_state.is_synced(),
            ],
        )?;
        Ok(())
    }

    /// Run a workout query and a route query with the same filter and
    /// parameters, returning both result sets as records.
    fn query_records(
        conn: &Connection,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        let sql = format!("SELECT {} FROM workouts {}", WORKOUT_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let workouts = stmt.query_map(params, workout_from_row)?;
        for workout in workouts {
            records.push(Record::Workout(workout?));
        }

        let sql = format!("SELECT {} FROM routes {}", ROUTE_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let routes = stmt.query_map(params, route_from_row)?;
        for route in routes {
            records.push(Record::Route(route?));
        }

        Ok(records)
    }
}

fn sync_state_from(synced: bool) -> SyncState {
    if synced {
        SyncState::Synced
    } else {
        SyncState::Pending
    }
}

fn workout_from_row(row: &Row<'_>) -> rusqlite::Result<Workout> {
    Ok(Workout {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        activity_type: row.get(2)?,
        duration: row.get(3)?,
        intensity: row.get(4)?,
        completion_percentage: row.get(5)?,
        timestamp: from_millis(row.get(6)?),
        created_at: from_millis(row.get(7)?),
        sync_state: sync_state_from(row.get(8)?),
    })
}

fn route_from_row(row: &Row<'_>) -> rusqlite::Result<Route> {
    let points_json: String = row.get(8)?;
    let path_points: Vec<LocationPoint> = serde_json::from_str(&points_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let duration_ms: i64 = row.get(4)?;

    Ok(Route {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        route_name: row.get(2)?,
        distance_km: row.get(3)?,
        duration_ms: duration_ms.max(0) as u64,
        average_pace: row.get(5)?,
        estimated_heart_rate: row.get(6)?,
        calories_burnt: row.get(7)?,
        path_points,
        timestamp: from_millis(row.get(9)?),
        created_at: from_millis(row.get(10)?),
        sync_state: sync_state_from(row.get(11)?),
    })
}

/// Newest-created first; ID breaks ties so the order is stable.
fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn insert(&self, record: &Record) -> Result<()> {
        let conn = self.conn.lock().await;
        match record {
            Record::Workout(w) => Self::insert_workout(&conn, w),
            Record::Route(r) => Self::insert_route(&conn, r),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().await;

        let sql = format!("SELECT {} FROM workouts WHERE id = ?1", WORKOUT_COLUMNS);
        if let Some(workout) = conn
            .query_row(&sql, params![id], workout_from_row)
            .optional()?
        {
            return Ok(Some(Record::Workout(workout)));
        }

        let sql = format!("SELECT {} FROM routes WHERE id = ?1", ROUTE_COLUMNS);
        let route = conn
            .query_row(&sql, params![id], route_from_row)
            .optional()?;
        Ok(route.map(Record::Route))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().await;
        let mut records = Self::query_records(&conn, "WHERE owner_id = ?1", &[&owner_id])?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn list_unsynced(&self) -> Result<Vec<Record>> {
        let conn = self.conn.lock().await;
        Self::query_records(&conn, "WHERE synced = 0", &[])
    }

    async fn mark_synced(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE workouts SET synced = 1 WHERE id = ?1 AND synced = 0",
            params![id],
        )?;
        conn.execute(
            "UPDATE routes SET synced = 1 WHERE id = ?1 AND synced = 0",
            params![id],
        )?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM workouts WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM routes WHERE id = ?1", params![id])?;
        Ok(())
    }

    async fn search(&self, owner_id: &str, query: &str) -> Result<Vec<Record>> {
        // SQLite LIKE only folds ASCII case, so match in Rust instead.
        let needle = query.to_lowercase();
        let records = self.list_by_owner(owner_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.label().to_lowercase().contains(&needle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use chrono::{Duration, Utc};

    fn workout(owner: &str, activity: &str) -> Workout {
        Workout::new(owner, activity, "30 min", "Medium", 90, Utc::now()).unwrap()
    }

    fn route(owner: &str, name: &str) -> Route {
        let points = vec![
            LocationPoint {
                latitude: 37.33,
                longitude: -122.08,
                timestamp: 1_700_000_000_000,
            },
            LocationPoint {
                latitude: 37.34,
                longitude: -122.08,
                timestamp: 1_700_000_300_000,
            },
        ];
        Route::from_tracking(owner, name, points, 300_000, &UserProfile::default()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = route("u1", "Morning loop");

        store.insert(&Record::Route(r.clone())).await.unwrap();

        let fetched = store.get(&r.id).await.unwrap().expect("route exists");
        match fetched {
            Record::Route(got) => {
                assert_eq!(got.path_points, r.path_points);
                assert_eq!(got.route_name, "Morning loop");
                assert_eq!(got.created_at.timestamp_millis(), r.created_at.timestamp_millis());
                assert_eq!(got.sync_state, SyncState::Pending);
            }
            other => panic!("expected route, got {:?}", other),
        }
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_on_duplicate_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut w = workout("u1", "Running");
        store.insert(&Record::Workout(w.clone())).await.unwrap();

        w.intensity = "High".to_string();
        store.insert(&Record::Workout(w.clone())).await.unwrap();

        let all = store.list_by_owner("u1").await.unwrap();
        assert_eq!(all.len(), 1);
        match &all[0] {
            Record::Workout(got) => assert_eq!(got.intensity, "High"),
            other => panic!("expected workout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_by_owner_newest_first_and_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut older = workout("u1", "Yoga");
        older.created_at = Utc::now() - Duration::hours(2);
        let mut newer = route("u1", "Evening run");
        newer.created_at = Utc::now() - Duration::hours(1);
        let other_owner = workout("u2", "Cycling");

        store.insert(&older.clone().into()).await.unwrap();
        store.insert(&newer.clone().into()).await.unwrap();
        store.insert(&other_owner.into()).await.unwrap();

        let ids: Vec<String> = store
            .list_by_owner("u1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_mark_synced_is_idempotent_and_tolerates_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let w = workout("u1", "Running");
        let r = route("u2", "Trail");
        store.insert(&w.clone().into()).await.unwrap();
        store.insert(&r.clone().into()).await.unwrap();

        assert_eq!(store.list_unsynced().await.unwrap().len(), 2);

        store.mark_synced(&w.id).await.unwrap();
        store.mark_synced(&w.id).await.unwrap();
        store.mark_synced("never-existed").await.unwrap();

        let unsynced = store.list_unsynced().await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id(), r.id);
        assert_eq!(
            store.get(&w.id).await.unwrap().unwrap().sync_state(),
            SyncState::Synced
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = route("u1", "Ridge");
        store.insert(&r.clone().into()).await.unwrap();

        store.delete(&r.id).await.unwrap();
        store.delete(&r.id).await.unwrap();

        assert!(store.get(&r.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&route("u1", "Rancho Loop").into()).await.unwrap();
        store.insert(&route("u1", "Ridge Trail").into()).await.unwrap();
        store.insert(&route("u2", "Rancho Ridge").into()).await.unwrap();

        let hits = store.search("u1", "rANCHO").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label(), "Rancho Loop");

        assert_eq!(store.search("u1", "").await.unwrap().len(), 2);
        assert!(store.search("u1", "nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");
        let w = workout("u1", "Rowing");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&w.clone().into()).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let unsynced = reopened.list_unsynced().await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id(), w.id);
    }
}
