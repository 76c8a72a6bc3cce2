// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SegmentEffort;

/// Activity types that count as rides when scanning for segment efforts.
pub const RIDE_TYPES: [&str; 8] = [
    "Ride",
    "VirtualRide",
    "EBikeRide",
    "GravelRide",
    "MountainBikeRide",
    "RoadRide",
    "Cyclocross",
    "TrailRide",
];

/// Summary activity as returned by the athlete activity list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Strava activity ID
    pub id: u64,
    /// Activity name/title
    pub name: String,
    /// Legacy activity type (Ride, Run, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Start date/time (UTC)
    pub start_date: DateTime<Utc>,
    /// Distance in meters
    #[serde(default)]
    pub distance: f64,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time: u64,
    /// Average speed in meters/second
    #[serde(default)]
    pub average_speed: f64,
}

impl ActivitySummary {
    /// Whether this activity is one of the ride-like types.
    pub fn is_ride(&self) -> bool {
        RIDE_TYPES.contains(&self.activity_type.as_str())
    }
}

/// Detailed activity with all segment efforts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedActivity {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub segment_efforts: Vec<SegmentEffort>,
}
