// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout model for local storage and remote sync.

use crate::error::{Result, SyncError};
use crate::models::record::{new_record_id, SyncState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logged workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    /// Client-generated ID (also used as document ID)
    pub id: String,
    /// Owning user ID
    pub owner_id: String,
    /// Activity type (Running, Cycling, Yoga, etc.)
    pub activity_type: String,
    /// Duration as entered by the user (e.g. "45 min")
    pub duration: String,
    /// Intensity label (Low, Medium, High)
    pub intensity: String,
    /// Percentage of the planned workout completed (0-100)
    pub completion_percentage: u8,
    /// When the workout took place
    pub timestamp: DateTime<Utc>,
    /// Client-side creation instant
    pub created_at: DateTime<Utc>,
    /// Local-only sync flag; never sent to the remote store
    #[serde(skip)]
    pub sync_state: SyncState,
}

impl Workout {
    /// Create a new Pending workout with a fresh client-side ID.
    pub fn new(
        owner_id: &str,
        activity_type: &str,
        duration: &str,
        intensity: &str,
        completion_percentage: u8,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        if owner_id.trim().is_empty() {
            return Err(SyncError::InvalidRecord("owner_id is empty".to_string()));
        }
        if completion_percentage > 100 {
            return Err(SyncError::InvalidRecord(format!(
                "completion_percentage {} exceeds 100",
                completion_percentage
            )));
        }

        Ok(Self {
            id: new_record_id(),
            owner_id: owner_id.to_string(),
            activity_type: activity_type.to_string(),
            duration: duration.to_string(),
            intensity: intensity.to_string(),
            completion_percentage,
            timestamp,
            created_at: Utc::now(),
            sync_state: SyncState::Pending,
        })
    }
}
