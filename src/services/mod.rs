// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync logic layer.

pub mod connectivity;
pub mod scheduler;
pub mod sync;

pub use connectivity::{ConnectivityOracle, HttpProbe, ManualOracle};
pub use scheduler::{ReachabilityWatch, RetryBackoff, SyncScheduler};
pub use sync::{PurgeReport, SyncConfig, SyncEngine};
