// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline-first sync engine.
//!
//! Pushes Pending local records to the remote store and flips them to
//! Synced once the remote confirms. A pass:
//! 1. Checks reachability (offline is a quiet short-circuit)
//! 2. Lists the owner's Pending records
//! 3. Upserts each one with a bounded timeout, marking it Synced on success
//! 4. Returns per-kind counts; failed records stay Pending for the next pass
//!
//! Concurrent passes for the same owner coalesce: a caller arriving while a
//! pass is running waits for it and returns the same result. A pass cut
//! short by its caller's cancellation is not shared; a waiter reruns it.
//!
//! Independently, a record-level fence guarantees no two pushes of one ID
//! ever overlap. Deletion waits on the fence, so a record deleted while it
//! is being pushed still gets its remote delete.

use crate::config::Config;
use crate::db::{LocalStore, RemoteStore};
use crate::error::{Result, SyncError};
use crate::models::{PendingCounts, Record, RecordKind, SyncReport, Workout};
use crate::services::ConnectivityOracle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Cap on concurrent best-effort remote deletes during a purge.
const MAX_CONCURRENT_REMOTE_OPS: usize = 8;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bound on each remote upsert/delete
    pub remote_timeout: Duration,
    /// Concurrent remote deletes during a purge
    pub max_concurrent_remote_ops: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(crate::config::DEFAULT_REMOTE_TIMEOUT_SECS),
            max_concurrent_remote_ops: MAX_CONCURRENT_REMOTE_OPS,
        }
    }
}

impl From<&Config> for SyncConfig {
    fn from(config: &Config) -> Self {
        Self {
            remote_timeout: config.remote_timeout,
            ..Self::default()
        }
    }
}

/// Result of an account purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub local_deleted: u32,
    pub remote_deleted: u32,
    pub remote_failed: u32,
}

/// What happened to a single record push.
enum PushOutcome {
    Pushed,
    Failed,
    /// Another caller is pushing the same ID right now
    AlreadyInFlight,
    /// Deleted locally after it was picked up; not counted
    Vanished,
}

type PassOutcome = Option<Result<SyncReport>>;

/// Role of a caller entering `sync_all` for an owner.
enum PassSlot {
    Leader(watch::Sender<PassOutcome>),
    Follower(watch::Receiver<PassOutcome>),
}

/// Removes the owner's in-flight slot however the pass ends.
struct PassGuard<'a> {
    passes: &'a DashMap<String, watch::Receiver<PassOutcome>>,
    owner_id: &'a str,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.passes.remove(self.owner_id);
    }
}

/// Releases a record ID from the push fence. Dropping `_done` afterwards
/// wakes anyone waiting for the push to finish.
struct RecordFence<'a> {
    in_flight: &'a DashMap<String, watch::Receiver<()>>,
    id: String,
    _done: watch::Sender<()>,
}

impl Drop for RecordFence<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// True if the leader's own token stopped the pass early. Waiters have
/// their own tokens, so such an outcome is not theirs to inherit.
fn cut_short(outcome: &Result<SyncReport>) -> bool {
    match outcome {
        Ok(report) => report.was_cut_short(),
        Err(e) => matches!(e, SyncError::Cancelled),
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Coordinates the local store, the remote store and connectivity.
pub struct SyncEngine {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    oracle: Arc<dyn ConnectivityOracle>,
    config: SyncConfig,
    /// Per-owner running pass; followers subscribe to its outcome.
    passes: DashMap<String, watch::Receiver<PassOutcome>>,
    /// Record IDs with a remote upsert outstanding; the receiver closes
    /// when the push finishes.
    records_in_flight: DashMap<String, watch::Receiver<()>>,
}

impl SyncEngine {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        oracle: Arc<dyn ConnectivityOracle>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            remote,
            oracle,
            config,
            passes: DashMap::new(),
            records_in_flight: DashMap::new(),
        }
    }

    // ─── Sync Passes ─────────────────────────────────────────────

    /// Push every Pending record of `owner_id`.
    ///
    /// Returns `SyncError::Offline` when the remote is unreachable; callers
    /// treat that as quiescent (see [`SyncError::is_quiet`]). Only storage
    /// failures are hard errors.
    pub async fn sync_all(&self, owner_id: &str) -> Result<SyncReport> {
        self.sync_all_cancellable(owner_id, &CancellationToken::new())
            .await
    }

    /// [`sync_all`](Self::sync_all) that stops pulling records once
    /// `cancel` fires. The record being pushed at that moment finishes (or
    /// fails) on its own; the partial report is returned.
    pub async fn sync_all_cancellable(
        &self,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        loop {
            let slot = match self.passes.entry(owner_id.to_string()) {
                Entry::Occupied(entry) => PassSlot::Follower(entry.get().clone()),
                Entry::Vacant(entry) => {
                    let (tx, rx) = watch::channel(None);
                    entry.insert(rx);
                    PassSlot::Leader(tx)
                }
            };

            match slot {
                PassSlot::Follower(mut rx) => {
                    tracing::debug!(owner_id, "Sync pass already running, coalescing");
                    let published = tokio::select! {
                        changed = rx.wait_for(Option::is_some) => changed.map(|outcome| outcome.clone()),
                        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    };
                    match published {
                        Ok(Some(outcome)) => return outcome,
                        // Leader went away without a result; take over.
                        _ => continue,
                    }
                }
                PassSlot::Leader(tx) => {
                    let guard = PassGuard {
                        passes: &self.passes,
                        owner_id,
                    };
                    let outcome = self.run_pass(owner_id, cancel).await;
                    drop(guard);
                    if cut_short(&outcome) {
                        // Closing the channel sends waiters back to take over.
                        drop(tx);
                    } else {
                        tx.send_replace(Some(outcome.clone()));
                    }
                    return outcome;
                }
            }
        }
    }

    async fn run_pass(&self, owner_id: &str, cancel: &CancellationToken) -> Result<SyncReport> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        if !self.oracle.is_reachable().await {
            tracing::debug!(owner_id, "Remote unreachable, skipping sync pass");
            return Err(SyncError::Offline);
        }

        let mut pending: Vec<Record> = self
            .local
            .list_unsynced()
            .await
            .inspect_err(|e| tracing::error!(owner_id, error = %e, "Failed to list unsynced records"))?
            .into_iter()
            .filter(|r| r.owner_id() == owner_id)
            .collect();
        // Kinds sync independently; grouping just keeps the logs readable.
        pending.sort_by_key(|r| r.kind() == RecordKind::Route);

        tracing::info!(owner_id, pending = pending.len(), "Starting sync pass");

        let mut report = SyncReport::default();
        for (i, record) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                report.remaining = count(pending.len() - i);
                tracing::info!(owner_id, ?report, "Sync pass cancelled");
                return Ok(report);
            }

            match self.push(record).await? {
                PushOutcome::Pushed => report.record_success(record.kind()),
                PushOutcome::Failed => report.failed += 1,
                PushOutcome::AlreadyInFlight | PushOutcome::Vanished => {}
            }
        }

        tracing::info!(
            owner_id,
            workouts_synced = report.workouts_synced,
            routes_synced = report.routes_synced,
            failed = report.failed,
            "Sync pass complete"
        );

        Ok(report)
    }

    /// Push one record. Returns `true` if the remote confirmed it and it is
    /// now Synced locally; `false` if the push failed, the same record was
    /// already being pushed by another caller, or it was deleted locally.
    pub async fn sync_one(&self, record: &Record) -> Result<bool> {
        Ok(matches!(self.push(record).await?, PushOutcome::Pushed))
    }

    async fn push(&self, record: &Record) -> Result<PushOutcome> {
        let id = record.id();
        let (done, done_rx) = watch::channel(());
        match self.records_in_flight.entry(id.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!(record_id = id, "Record already being pushed, skipping");
                return Ok(PushOutcome::AlreadyInFlight);
            }
            Entry::Vacant(entry) => {
                entry.insert(done_rx);
            }
        }
        let _fence = RecordFence {
            in_flight: &self.records_in_flight,
            id: id.to_string(),
            _done: done,
        };

        // The pass listed records before pushing; any may be gone by now.
        if self.local.get(id).await?.is_none() {
            tracing::debug!(record_id = id, "Record deleted before push, skipping");
            return Ok(PushOutcome::Vanished);
        }

        let result =
            match tokio::time::timeout(self.config.remote_timeout, self.remote.upsert(record))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout(self.config.remote_timeout)),
            };

        match result {
            Ok(()) => {
                if self.local.get(id).await?.is_none() {
                    // The deleter is waiting on our fence and removes the remote copy.
                    tracing::debug!(record_id = id, "Record deleted during push");
                    return Ok(PushOutcome::Vanished);
                }
                self.local.mark_synced(id).await?;
                tracing::debug!(record_id = id, kind = %record.kind(), "Record synced");
                Ok(PushOutcome::Pushed)
            }
            Err(e) => {
                tracing::warn!(
                    record_id = id,
                    kind = %record.kind(),
                    error = %e,
                    "Record push failed, leaving Pending"
                );
                Ok(PushOutcome::Failed)
            }
        }
    }

    // ─── Record Lifecycle ────────────────────────────────────────

    /// Persist a new record locally, then push it right away if the remote
    /// is reachable. A failed push leaves it Pending for the next pass.
    pub async fn save(&self, record: Record) -> Result<String> {
        self.local.insert(&record).await?;
        tracing::info!(record_id = record.id(), kind = %record.kind(), "Record saved locally");

        if self.oracle.is_reachable().await {
            self.push(&record).await?;
        }

        Ok(record.id().to_string())
    }

    /// Delete a record. Synced records are also deleted remotely, best
    /// effort: the local deletion stands even if the remote call fails.
    /// A record caught mid-push is treated as Synced once the push ends.
    ///
    /// Returns `false` if the record did not exist locally.
    pub async fn delete_record(&self, id: &str) -> Result<bool> {
        let Some(record) = self.local.get(id).await? else {
            return Ok(false);
        };

        self.local.delete(id).await?;
        let raced_push = self.wait_for_push(id).await;

        if record.sync_state().is_synced() || raced_push {
            if let Err(e) = self.remote_delete(record.kind(), id).await {
                tracing::warn!(record_id = id, error = %e, "Remote delete failed (local copy removed)");
            }
        }

        tracing::info!(record_id = id, kind = %record.kind(), "Record deleted");
        Ok(true)
    }

    /// Delete all local data for an owner (account deletion).
    ///
    /// Previously-Synced records are deleted remotely, best effort and only
    /// if reachable; remote failures are logged and never block the purge.
    pub async fn purge_owner(&self, owner_id: &str) -> Result<PurgeReport> {
        let records = self.local.list_by_owner(owner_id).await?;
        let mut report = PurgeReport::default();

        for record in &records {
            self.local.delete(record.id()).await?;
            report.local_deleted += 1;
        }

        // Only wait once everything is gone locally, so no new push can start.
        let mut synced = Vec::new();
        for record in &records {
            let raced_push = self.wait_for_push(record.id()).await;
            if record.sync_state().is_synced() || raced_push {
                synced.push((record.kind(), record.id().to_string()));
            }
        }

        if !synced.is_empty() {
            if self.oracle.is_reachable().await {
                let results = stream::iter(synced)
                    .map(|(kind, id)| async move {
                        let result = self.remote_delete(kind, &id).await;
                        (id, result)
                    })
                    .buffer_unordered(self.config.max_concurrent_remote_ops.max(1))
                    .collect::<Vec<_>>()
                    .await;

                for (id, result) in results {
                    match result {
                        Ok(()) => report.remote_deleted += 1,
                        Err(e) => {
                            report.remote_failed += 1;
                            tracing::warn!(owner_id, record_id = %id, error = %e, "Remote delete failed during purge");
                        }
                    }
                }
            } else {
                for (_, id) in &synced {
                    report.remote_failed += 1;
                    tracing::debug!(owner_id, record_id = %id, "Remote delete skipped");
                }
                tracing::warn!(
                    owner_id,
                    skipped = report.remote_failed,
                    "Remote unreachable, skipping remote deletes during purge"
                );
            }
        }

        tracing::info!(
            owner_id,
            local_deleted = report.local_deleted,
            remote_deleted = report.remote_deleted,
            remote_failed = report.remote_failed,
            "Owner data purged"
        );

        Ok(report)
    }

    /// Wait for an outstanding push of `id` to finish. Returns `true` if
    /// one was outstanding, since its upsert may have reached the remote.
    async fn wait_for_push(&self, id: &str) -> bool {
        let Some(mut done) = self
            .records_in_flight
            .get(id)
            .map(|entry| entry.value().clone())
        else {
            return false;
        };

        tracing::debug!(record_id = id, "Waiting for in-flight push before remote delete");
        // Errors once the fence drops its sender; nothing is ever sent.
        let _ = done.changed().await;
        true
    }

    async fn remote_delete(&self, kind: RecordKind, id: &str) -> Result<()> {
        match tokio::time::timeout(self.config.remote_timeout, self.remote.delete(kind, id)).await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.config.remote_timeout)),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────

    /// Pending records of an owner, per kind.
    pub async fn pending_counts(&self, owner_id: &str) -> Result<PendingCounts> {
        let mut counts = PendingCounts::default();
        for record in self.local.list_unsynced().await? {
            if record.owner_id() != owner_id {
                continue;
            }
            match record.kind() {
                RecordKind::Workout => counts.workouts += 1,
                RecordKind::Route => counts.routes += 1,
            }
        }
        Ok(counts)
    }

    /// The owner's newest workouts, at most `limit`.
    pub async fn recent_workouts(&self, owner_id: &str, limit: usize) -> Result<Vec<Workout>> {
        Ok(self
            .local
            .list_by_owner(owner_id)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Record::Workout(w) => Some(w),
                Record::Route(_) => None,
            })
            .take(limit)
            .collect())
    }
}
