// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background sync triggers.
//!
//! Runs a pass on start, on a periodic cadence, and whenever reachability
//! flips from unreachable to reachable. A pass that leaves records Pending
//! (or hits a storage error) is retried sooner with exponential backoff.

use crate::config::Config;
use crate::error::SyncError;
use crate::services::{ConnectivityOracle, SyncEngine};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Exponential retry delay: `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl RetryBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay before the next retry; each call doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Tracks the last observed reachability to detect "came back online".
pub struct ReachabilityWatch {
    oracle: Arc<dyn ConnectivityOracle>,
    last: bool,
}

impl ReachabilityWatch {
    pub fn new(oracle: Arc<dyn ConnectivityOracle>, initially_reachable: bool) -> Self {
        Self {
            oracle,
            last: initially_reachable,
        }
    }

    /// Probe once; `true` only on an unreachable → reachable transition.
    pub async fn regained(&mut self) -> bool {
        let now = self.oracle.is_reachable().await;
        let regained = now && !self.last;
        self.last = now;
        regained
    }
}

/// Why a pass was started (for logs).
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Scheduled,
    Reconnected,
}

/// Drives `SyncEngine::sync_all` for one owner until cancelled.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    oracle: Arc<dyn ConnectivityOracle>,
    owner_id: String,
    interval: Duration,
    poll: Duration,
    backoff: RetryBackoff,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SyncEngine>,
        oracle: Arc<dyn ConnectivityOracle>,
        owner_id: &str,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            oracle,
            owner_id: owner_id.to_string(),
            interval: config.sync_interval,
            poll: config.reachability_poll,
            backoff: RetryBackoff::new(config.retry_base, config.sync_interval),
        }
    }

    /// Run until `cancel` fires. The first pass starts immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        let owner_id = self.owner_id.clone();
        let initially = self.oracle.is_reachable().await;
        let mut watch = ReachabilityWatch::new(self.oracle.clone(), initially);
        let mut next_pass = Instant::now();

        tracing::info!(
            owner_id = %owner_id,
            interval_secs = self.interval.as_secs(),
            "Sync scheduler started"
        );

        loop {
            let trigger = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_pass) => Trigger::Scheduled,
                _ = tokio::time::sleep(self.poll) => {
                    if !watch.regained().await {
                        continue;
                    }
                    Trigger::Reconnected
                }
            };

            tracing::debug!(owner_id = %owner_id, ?trigger, "Sync triggered");

            let delay = match self.engine.sync_all_cancellable(&owner_id, &cancel).await {
                Ok(report) if report.is_clean() => {
                    self.backoff.reset();
                    self.interval
                }
                Ok(report) => {
                    let delay = self.backoff.next_delay();
                    tracing::info!(
                        owner_id = %owner_id,
                        pending = report.failed + report.remaining,
                        retry_in_secs = delay.as_secs(),
                        "Items pending sync, scheduling retry"
                    );
                    delay
                }
                Err(SyncError::Cancelled) if cancel.is_cancelled() => break,
                // Another caller's token stopped the pass; ours is still live.
                Err(SyncError::Cancelled) => self.backoff.next_delay(),
                // Reconnection is picked up by the watcher.
                Err(e) if e.is_quiet() => self.interval,
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::error!(owner_id = %owner_id, error = %e, "Sync pass failed");
                    delay
                }
            };

            let next_at =
                Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
            tracing::debug!(
                owner_id = %owner_id,
                next_pass_at = %format_utc_rfc3339(next_at),
                "Next sync pass scheduled"
            );
            next_pass = Instant::now() + delay;
        }

        tracing::info!(owner_id = %owner_id, "Sync scheduler stopped");
    }
}
