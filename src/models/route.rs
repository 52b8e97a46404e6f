// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! GPS route model and tracking metrics.
//!
//! Routes are built once from a finished tracking session. Distance, pace,
//! heart-rate estimate and calories are derived from the recorded points and
//! the user's profile, then stored with the route.

use crate::error::{Result, SyncError};
use crate::models::record::{new_record_id, SyncState};
use crate::time_utils::format_duration;
use chrono::{DateTime, Utc};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A single recorded GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Fix time in epoch milliseconds
    pub timestamp: i64,
}

impl LocationPoint {
    fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Physical profile used for heart-rate and calorie estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserProfile {
    pub age: u32,
    pub weight_kg: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            age: 30,
            weight_kg: 70.0,
        }
    }
}

/// Recorded GPS route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Client-generated ID (also used as document ID)
    pub id: String,
    /// Owning user ID
    pub owner_id: String,
    /// Display name, searchable
    pub route_name: String,
    /// Total distance in kilometers
    pub distance_km: f64,
    /// Moving time in milliseconds
    pub duration_ms: u64,
    /// Average pace in min/km
    pub average_pace: f64,
    /// Estimated average heart rate (bpm)
    pub estimated_heart_rate: u32,
    /// Estimated calories burnt (kcal)
    pub calories_burnt: f64,
    /// Ordered GPS fixes
    pub path_points: Vec<LocationPoint>,
    /// When the route was recorded
    pub timestamp: DateTime<Utc>,
    /// Client-side creation instant
    pub created_at: DateTime<Utc>,
    /// Local-only sync flag; never sent to the remote store
    #[serde(skip)]
    pub sync_state: SyncState,
}

impl Route {
    /// Build a Pending route from a finished tracking session.
    ///
    /// A blank `route_name` gets a generated "Run on ..." name.
    pub fn from_tracking(
        owner_id: &str,
        route_name: &str,
        path_points: Vec<LocationPoint>,
        duration_ms: u64,
        profile: &UserProfile,
    ) -> Result<Self> {
        if owner_id.trim().is_empty() {
            return Err(SyncError::InvalidRecord("owner_id is empty".to_string()));
        }

        let now = Utc::now();
        let route_name = match route_name.trim() {
            "" => default_route_name(now),
            name => name.to_string(),
        };

        let distance_km = total_distance_km(&path_points);
        let average_pace = pace_min_per_km(distance_km, duration_ms);
        let id = new_record_id();

        tracing::debug!(
            record_id = %id,
            points = path_points.len(),
            distance_km,
            pace = %format_pace(average_pace),
            duration = %format_duration(duration_ms),
            "Route built from tracking session"
        );

        Ok(Self {
            id,
            owner_id: owner_id.to_string(),
            route_name,
            distance_km,
            duration_ms,
            average_pace,
            estimated_heart_rate: estimate_heart_rate(average_pace, profile),
            calories_burnt: calories_burnt(distance_km, duration_ms, profile),
            path_points,
            timestamp: now,
            created_at: now,
            sync_state: SyncState::Pending,
        })
    }
}

/// Name given to routes saved without one.
pub fn default_route_name(date: DateTime<Utc>) -> String {
    format!("Run on {}", date.format("%b %d, %Y at %-I:%M %p"))
}

/// Total great-circle distance along the points, in kilometers.
pub fn total_distance_km(points: &[LocationPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| Haversine.distance(pair[0].to_point(), pair[1].to_point()))
        .sum::<f64>()
        / 1000.0
}

/// Pace in minutes per kilometer; zero when no distance was covered.
pub fn pace_min_per_km(distance_km: f64, duration_ms: u64) -> f64 {
    if distance_km <= 0.0 {
        return 0.0;
    }
    (duration_ms as f64 / 60_000.0) / distance_km
}

/// Format a pace as `M:SS` per km.
pub fn format_pace(pace_min_per_km: f64) -> String {
    if !pace_min_per_km.is_finite() || pace_min_per_km <= 0.0 {
        return "0:00".to_string();
    }
    let minutes = pace_min_per_km.trunc() as u64;
    let seconds = ((pace_min_per_km - minutes as f64) * 60.0) as u64;
    format!("{}:{:02}", minutes, seconds)
}

/// Estimate average heart rate from pace as a share of max HR (220 - age).
pub fn estimate_heart_rate(pace_min_per_km: f64, profile: &UserProfile) -> u32 {
    let max_hr = 220u32.saturating_sub(profile.age) as f64;

    let share = if pace_min_per_km > 8.0 {
        0.65
    } else if pace_min_per_km > 6.0 {
        0.775
    } else {
        0.90
    };

    (max_hr * share) as u32
}

/// Estimate calories as MET x weight (kg) x hours, with MET picked by speed.
pub fn calories_burnt(distance_km: f64, duration_ms: u64, profile: &UserProfile) -> f64 {
    let hours = duration_ms as f64 / 3_600_000.0;
    let speed_kmh = if hours > 0.0 { distance_km / hours } else { 0.0 };

    let met = match speed_kmh {
        s if s < 6.4 => 6.0,
        s if s < 8.0 => 8.3,
        s if s < 9.7 => 9.8,
        s if s < 11.3 => 10.5,
        s if s < 12.9 => 11.0,
        _ => 11.5,
    };

    met * profile.weight_kg * hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(latitude: f64, longitude: f64) -> LocationPoint {
        LocationPoint {
            latitude,
            longitude,
            timestamp: 0,
        }
    }

    #[test]
    fn test_total_distance_needs_two_points() {
        assert_eq!(total_distance_km(&[]), 0.0);
        assert_eq!(total_distance_km(&[point(37.0, -122.0)]), 0.0);
    }

    #[test]
    fn test_total_distance_one_degree_latitude() {
        // One degree of latitude is roughly 111 km
        let km = total_distance_km(&[point(37.0, -122.0), point(38.0, -122.0)]);
        assert!((km - 111.2).abs() < 0.5, "got {}", km);
    }

    #[test]
    fn test_pace_and_format() {
        // 5 km in 25 minutes
        let pace = pace_min_per_km(5.0, 25 * 60_000);
        assert!((pace - 5.0).abs() < f64::EPSILON);
        assert_eq!(format_pace(pace), "5:00");
        assert_eq!(format_pace(5.5), "5:30");
        assert_eq!(pace_min_per_km(0.0, 60_000), 0.0);
        assert_eq!(format_pace(f64::INFINITY), "0:00");
    }

    #[test]
    fn test_heart_rate_bands() {
        let profile = UserProfile::default(); // max HR 190
        assert_eq!(estimate_heart_rate(9.0, &profile), 123);
        assert_eq!(estimate_heart_rate(7.0, &profile), 147);
        assert_eq!(estimate_heart_rate(5.0, &profile), 171);
    }

    #[test]
    fn test_calories_use_speed_band() {
        let profile = UserProfile::default();
        // 10 km/h for one hour -> MET 10.5
        let kcal = calories_burnt(10.0, 3_600_000, &profile);
        assert!((kcal - 735.0).abs() < 1e-9);
        assert_eq!(calories_burnt(0.0, 0, &profile), 0.0);
    }

    #[test]
    fn test_from_tracking_derives_metrics() {
        let points = vec![point(37.0, -122.0), point(37.01, -122.0)];
        let route = Route::from_tracking(
            "u1",
            "Hill loop",
            points,
            10 * 60_000,
            &UserProfile::default(),
        )
        .unwrap();

        assert_eq!(route.route_name, "Hill loop");
        assert_eq!(route.sync_state, SyncState::Pending);
        assert!(route.distance_km > 1.0 && route.distance_km < 1.2);
        assert!(route.average_pace > 0.0);
        assert_eq!(route.path_points.len(), 2);
    }

    #[test]
    fn test_blank_route_name_gets_default() {
        let route =
            Route::from_tracking("u1", "  ", Vec::new(), 0, &UserProfile::default()).unwrap();
        assert!(route.route_name.starts_with("Run on "));
    }

    #[test]
    fn test_default_route_name_format() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        assert_eq!(default_route_name(date), "Run on Mar 05, 2024 at 2:07 PM");
    }
}
