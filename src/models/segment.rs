// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Segment and segment effort models.

use serde::{Deserialize, Serialize};

/// Segment IDs are opaque keys.
pub type SegmentId = u64;

/// A named stretch of route with reference geometry.
///
/// Efforts embed a summary segment without a map; the segment detail
/// endpoint fills in `map` and the total elevation gain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    #[serde(default)]
    pub name: String,
    /// Length in meters
    #[serde(default)]
    pub distance: f64,
    /// Average grade in percent
    #[serde(default)]
    pub average_grade: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elev_difference: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_elevation_gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<SegmentMap>,
}

impl Segment {
    /// Get the detailed polyline, falling back to summary if not available.
    pub fn polyline(&self) -> Option<&str> {
        let map = self.map.as_ref()?;
        let non_empty: fn(&Option<String>) -> Option<&str> = |p| p.as_deref().filter(|p| !p.is_empty());
        non_empty(&map.polyline).or_else(|| non_empty(&map.summary_polyline))
    }
}

/// Segment map data with polylines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentMap {
    pub polyline: Option<String>,
    pub summary_polyline: Option<String>,
}

/// One athlete traversal of a segment during one activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentEffort {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time: u64,
    /// Elapsed time in seconds
    #[serde(default)]
    pub elapsed_time: u64,
    /// Personal record rank (1-3) if this effort was a PR
    #[serde(default)]
    pub pr_rank: Option<u32>,
    pub segment: Segment,
}

impl SegmentEffort {
    /// Display name: the segment's name, else the effort's own.
    pub fn display_name(&self) -> &str {
        if self.segment.name.is_empty() {
            &self.name
        } else {
            &self.segment.name
        }
    }
}
