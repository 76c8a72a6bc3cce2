// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Segment aggregation over a bounded window of recent activities.
//!
//! Every remote call goes through [`SegmentSource`] and is awaited before
//! the next one is issued. Per-item failures are logged and skipped;
//! cancellation aborts the whole scan.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::cancel::CancelToken;
use crate::config::ScanPolicy;
use crate::error::AppError;
use crate::models::{ActivitySummary, DetailedActivity, Leaderboard, Segment, SegmentEffort, SegmentId};
use crate::polyline::{self, LatLng};

/// Remote lookups needed by the aggregator.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Activity detail with all segment efforts.
    async fn activity_detail(&self, activity_id: u64) -> Result<DetailedActivity, AppError>;

    /// Segment detail (polyline, elevation).
    async fn segment(&self, segment_id: SegmentId) -> Result<Segment, AppError>;

    async fn leaderboard(&self, segment_id: SegmentId) -> Result<Leaderboard, AppError>;

    /// Number of the athlete's efforts on one page of the all-efforts list.
    async fn effort_page(
        &self,
        segment_id: SegmentId,
        page: u32,
        per_page: u32,
    ) -> Result<usize, AppError>;
}

/// Occurrences of each segment within one scan window.
pub type SegmentCounts = HashMap<SegmentId, u32>;

pub const NO_EFFORTS_MESSAGE: &str = "No segment efforts returned for tested recent rides.";
pub const SEGMENTS_LOADED_MESSAGE: &str = "Segments loaded.";

/// What a scan tried and saw, for display when it finds nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanDiagnostics {
    pub attempted_ids: Vec<u64>,
    pub last_detail_sample: Value,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polyline_stats: Option<PolylineStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PolylineStats {
    /// Unique segments considered
    pub unique: usize,
    /// Segments with a usable decoded route
    pub decoded: usize,
}

/// Result of [`find_first_segment_set`].
#[derive(Debug, Clone, Serialize)]
pub struct FirstSegmentSet {
    pub source_activity: Option<u64>,
    pub efforts: Vec<SegmentEffort>,
    pub diagnostics: ScanDiagnostics,
}

/// Decoded route for one segment (always at least two points).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentGeometry {
    pub segment_id: SegmentId,
    pub points: Vec<LatLng>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeometrySet {
    pub geometries: Vec<SegmentGeometry>,
    pub centre: Option<LatLng>,
    pub stats: PolylineStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaderboardSet {
    pub leaderboards: HashMap<SegmentId, Leaderboard>,
    /// Segments whose leaderboard the token may not read
    pub forbidden: Vec<SegmentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklySegments {
    pub week_start: DateTime<Utc>,
    pub segment_ids: BTreeSet<SegmentId>,
}

/// Ride-type activities in list order, capped by the scan policy.
fn ride_window<'a>(
    activities: &'a [ActivitySummary],
    policy: &ScanPolicy,
) -> impl Iterator<Item = &'a ActivitySummary> {
    activities
        .iter()
        .filter(|a| a.is_ride())
        .take(policy.max_activities_to_scan)
}

/// Segment IDs in first-seen order.
pub fn unique_segment_ids(efforts: &[SegmentEffort]) -> Vec<SegmentId> {
    let mut seen = HashSet::new();
    efforts
        .iter()
        .map(|e| e.segment.id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Fetch ride details in order and stop at the first with any efforts.
pub async fn find_first_segment_set<S: SegmentSource + ?Sized>(
    source: &S,
    activities: &[ActivitySummary],
    policy: &ScanPolicy,
    cancel: &CancelToken,
) -> Result<FirstSegmentSet, AppError> {
    let mut diagnostics = ScanDiagnostics {
        message: NO_EFFORTS_MESSAGE.to_string(),
        ..Default::default()
    };

    for activity in ride_window(activities, policy) {
        diagnostics.attempted_ids.push(activity.id);

        let detail = match cancel.run(source.activity_detail(activity.id)).await {
            Ok(detail) => detail,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(activity_id = activity.id, error = %e, "Activity detail failed");
                diagnostics.last_detail_sample = json!({ "id": activity.id, "error": e.to_string() });
                continue;
            }
        };

        if detail.segment_efforts.is_empty() {
            diagnostics.last_detail_sample =
                serde_json::to_value(&detail).unwrap_or(Value::Null);
            continue;
        }

        diagnostics.last_detail_sample = json!({
            "id": detail.id,
            "segment_efforts": detail.segment_efforts.len(),
        });
        diagnostics.message = SEGMENTS_LOADED_MESSAGE.to_string();

        tracing::debug!(
            activity_id = detail.id,
            efforts = detail.segment_efforts.len(),
            "Found segment efforts"
        );
        return Ok(FirstSegmentSet {
            source_activity: Some(detail.id),
            efforts: detail.segment_efforts,
            diagnostics,
        });
    }

    Ok(FirstSegmentSet {
        source_activity: None,
        efforts: Vec::new(),
        diagnostics,
    })
}

/// Count how often each segment appears across the ride window.
pub async fn count_occurrences<S: SegmentSource + ?Sized>(
    source: &S,
    activities: &[ActivitySummary],
    policy: &ScanPolicy,
    cancel: &CancelToken,
) -> Result<SegmentCounts, AppError> {
    let mut counts = SegmentCounts::new();

    for activity in ride_window(activities, policy) {
        let detail = match cancel.run(source.activity_detail(activity.id)).await {
            Ok(detail) => detail,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(activity_id = activity.id, error = %e, "Skipping activity in count");
                continue;
            }
        };

        for effort in &detail.segment_efforts {
            *counts.entry(effort.segment.id).or_insert(0) += 1;
        }
    }

    Ok(counts)
}

/// Fill in segment detail for the displayed efforts and decode routes.
///
/// Segments already carrying a polyline are not fetched again.
pub async fn attach_geometry<S: SegmentSource + ?Sized>(
    source: &S,
    efforts: &mut [SegmentEffort],
    policy: &ScanPolicy,
    cancel: &CancelToken,
) -> Result<GeometrySet, AppError> {
    let ids = unique_segment_ids(efforts);
    let mut details: HashMap<SegmentId, Segment> = HashMap::new();

    for id in ids.iter().take(policy.polyline_detail_cap) {
        let embedded = efforts
            .iter()
            .find(|e| e.segment.id == *id && e.segment.polyline().is_some());
        if let Some(effort) = embedded {
            details.insert(*id, effort.segment.clone());
            continue;
        }

        match cancel.run(source.segment(*id)).await {
            Ok(segment) => {
                details.insert(*id, segment);
            }
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(segment_id = id, error = %e, "Segment detail failed");
            }
        }
    }

    for effort in efforts.iter_mut() {
        if let Some(detail) = details.get(&effort.segment.id) {
            merge_detail(&mut effort.segment, detail);
        }
    }

    let geometries: Vec<SegmentGeometry> = ids
        .iter()
        .filter_map(|id| {
            let encoded = details.get(id)?.polyline()?;
            let points = polyline::route_geometry(encoded)?;
            Some(SegmentGeometry {
                segment_id: *id,
                points,
            })
        })
        .collect();

    let centre = polyline::centre(geometries.iter().map(|g| g.points.as_slice()));
    let stats = PolylineStats {
        unique: ids.len(),
        decoded: geometries.len(),
    };

    Ok(GeometrySet {
        geometries,
        centre,
        stats,
    })
}

/// Copy detail-only fields onto an effort's summary segment.
fn merge_detail(target: &mut Segment, detail: &Segment) {
    if target.map.is_none() {
        target.map = detail.map.clone();
    }
    target.elev_difference = target.elev_difference.or(detail.elev_difference);
    target.total_elevation_gain = target.total_elevation_gain.or(detail.total_elevation_gain);
    target.elevation_high = target.elevation_high.or(detail.elevation_high);
    target.elevation_low = target.elevation_low.or(detail.elevation_low);
}

/// Fetch leaderboards for the first few unique segments.
pub async fn attach_leaderboards<S: SegmentSource + ?Sized>(
    source: &S,
    efforts: &[SegmentEffort],
    policy: &ScanPolicy,
    cancel: &CancelToken,
) -> Result<LeaderboardSet, AppError> {
    let mut set = LeaderboardSet::default();

    for id in unique_segment_ids(efforts)
        .into_iter()
        .take(policy.leaderboard_cap)
    {
        match cancel.run(source.leaderboard(id)).await {
            Ok(board) => {
                set.leaderboards.insert(id, board);
            }
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) if e.is_forbidden() => set.forbidden.push(id),
            Err(e) => {
                tracing::warn!(segment_id = id, error = %e, "Leaderboard fetch failed");
            }
        }
    }

    Ok(set)
}

/// Lifetime effort counts for displayed segments the scan window missed.
///
/// A segment that reports no efforts still counts the one on display.
pub async fn lifetime_effort_counts<S: SegmentSource + ?Sized>(
    source: &S,
    efforts: &[SegmentEffort],
    known: &SegmentCounts,
    policy: &ScanPolicy,
    cancel: &CancelToken,
) -> Result<SegmentCounts, AppError> {
    let mut counts = SegmentCounts::new();
    let per_page = policy.lifetime_page_size;

    for id in unique_segment_ids(efforts)
        .into_iter()
        .filter(|id| !known.contains_key(id))
    {
        let mut total: usize = 0;
        for page in 1..=policy.lifetime_max_pages {
            match cancel.run(source.effort_page(id, page, per_page)).await {
                Ok(n) => {
                    total += n;
                    if n < per_page as usize {
                        break;
                    }
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    tracing::warn!(segment_id = id, page, error = %e, "All-efforts page failed");
                    break;
                }
            }
        }

        let total = u32::try_from(total).unwrap_or(u32::MAX);
        counts.insert(id, total.max(1));
    }

    Ok(counts)
}

/// Midnight UTC on the Monday of the week containing `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let monday = now.date_naive() - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    Utc.from_utc_datetime(&monday.and_time(chrono::NaiveTime::MIN))
}

/// Distinct segments ridden this week (Monday-based), over a capped window.
pub async fn weekly_unique_segments<S: SegmentSource + ?Sized>(
    source: &S,
    activities: &[ActivitySummary],
    now: DateTime<Utc>,
    policy: &ScanPolicy,
    cancel: &CancelToken,
) -> Result<WeeklySegments, AppError> {
    let start = week_start(now);
    let end = start + Duration::days(7);
    let mut segment_ids = BTreeSet::new();

    for activity in activities
        .iter()
        .filter(|a| a.start_date >= start && a.start_date < end)
        .take(policy.max_activities_to_scan)
    {
        match cancel.run(source.activity_detail(activity.id)).await {
            Ok(detail) => {
                segment_ids.extend(detail.segment_efforts.iter().map(|e| e.segment.id));
            }
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(activity_id = activity.id, error = %e, "Failed weekly segment fetch");
            }
        }
    }

    Ok(WeeklySegments {
        week_start: start,
        segment_ids,
    })
}

/// Fastest elapsed time per segment among `efforts`.
pub fn best_times(efforts: &[SegmentEffort]) -> HashMap<SegmentId, u64> {
    let mut best: HashMap<SegmentId, u64> = HashMap::new();
    for effort in efforts {
        best.entry(effort.segment.id)
            .and_modify(|t| *t = (*t).min(effort.elapsed_time))
            .or_insert(effort.elapsed_time);
    }
    best
}

/// Elevation gain in meters: the stated difference, else the total gain,
/// else high minus low. Never negative.
pub fn derive_elevation_gain(segment: &Segment) -> Option<f64> {
    if let Some(diff) = segment.elev_difference {
        return Some(diff.max(0.0));
    }
    if let Some(total) = segment.total_elevation_gain {
        return Some(total.max(0.0));
    }
    match (segment.elevation_high, segment.elevation_low) {
        (Some(high), Some(low)) => Some((high - low).max(0.0)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::SegmentMap;
    use std::sync::Mutex;

    /// In-memory source that records every call.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub details: HashMap<u64, DetailedActivity>,
        pub segments: HashMap<SegmentId, Segment>,
        pub leaderboards: HashMap<SegmentId, Result<Leaderboard, String>>,
        pub forbidden: HashSet<SegmentId>,
        pub effort_pages: HashMap<SegmentId, Vec<usize>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl SegmentSource for FakeSource {
        async fn activity_detail(&self, activity_id: u64) -> Result<DetailedActivity, AppError> {
            self.record(format!("activity:{}", activity_id));
            self.details
                .get(&activity_id)
                .cloned()
                .ok_or_else(|| AppError::Transport("boom".to_string()))
        }

        async fn segment(&self, segment_id: SegmentId) -> Result<Segment, AppError> {
            self.record(format!("segment:{}", segment_id));
            self.segments
                .get(&segment_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(segment_id.to_string()))
        }

        async fn leaderboard(&self, segment_id: SegmentId) -> Result<Leaderboard, AppError> {
            self.record(format!("leaderboard:{}", segment_id));
            if self.forbidden.contains(&segment_id) {
                return Err(AppError::LeaderboardForbidden("Forbidden".to_string()));
            }
            match self.leaderboards.get(&segment_id) {
                Some(Ok(board)) => Ok(board.clone()),
                Some(Err(msg)) => Err(AppError::UnexpectedResponse(msg.clone())),
                None => Err(AppError::NotFound(segment_id.to_string())),
            }
        }

        async fn effort_page(
            &self,
            segment_id: SegmentId,
            page: u32,
            _per_page: u32,
        ) -> Result<usize, AppError> {
            self.record(format!("efforts:{}:{}", segment_id, page));
            self.effort_pages
                .get(&segment_id)
                .and_then(|pages| pages.get(page as usize - 1).copied())
                .ok_or_else(|| AppError::Transport("page failed".to_string()))
        }
    }

    pub(crate) fn ride(id: u64, activity_type: &str) -> ActivitySummary {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("Activity {}", id),
            "type": activity_type,
            "start_date": "2024-01-15T10:00:00Z"
        }))
        .unwrap()
    }

    pub(crate) fn effort(segment_id: SegmentId, name: &str, elapsed: u64) -> SegmentEffort {
        SegmentEffort {
            id: segment_id * 1000 + elapsed,
            name: name.to_string(),
            moving_time: elapsed,
            elapsed_time: elapsed,
            pr_rank: None,
            segment: Segment {
                id: segment_id,
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    pub(crate) fn detail(id: u64, efforts: Vec<SegmentEffort>) -> DetailedActivity {
        DetailedActivity {
            id,
            name: format!("Activity {}", id),
            activity_type: "Ride".to_string(),
            segment_efforts: efforts,
        }
    }

    #[tokio::test]
    async fn test_first_segment_set_short_circuits() {
        let mut source = FakeSource::default();
        source.details.insert(1, detail(1, vec![]));
        source.details.insert(2, detail(2, vec![effort(42, "Hill", 300)]));
        source.details.insert(3, detail(3, vec![effort(99, "Other", 100)]));

        let activities = vec![ride(1, "Ride"), ride(2, "Ride"), ride(3, "Ride")];
        let result = find_first_segment_set(
            &source,
            &activities,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.source_activity, Some(2));
        assert_eq!(result.efforts.len(), 1);
        assert_eq!(result.diagnostics.message, SEGMENTS_LOADED_MESSAGE);
        assert_eq!(result.diagnostics.last_detail_sample["segment_efforts"], 1);
        assert_eq!(source.calls(), vec!["activity:1", "activity:2"]);
    }

    #[tokio::test]
    async fn test_first_segment_set_none_found() {
        let mut source = FakeSource::default();
        source.details.insert(1, detail(1, vec![]));

        let activities = vec![ride(1, "Ride"), ride(2, "GravelRide")];
        let result = find_first_segment_set(
            &source,
            &activities,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert!(result.efforts.is_empty());
        assert_eq!(result.diagnostics.attempted_ids, vec![1, 2]);
        assert_eq!(result.diagnostics.message, NO_EFFORTS_MESSAGE);
        assert_eq!(result.diagnostics.last_detail_sample["id"], 2);
    }

    #[tokio::test]
    async fn test_window_skips_non_rides_and_caps() {
        let mut source = FakeSource::default();
        for id in 1..=5 {
            source.details.insert(id, detail(id, vec![]));
        }

        let activities = vec![
            ride(1, "Run"),
            ride(2, "Ride"),
            ride(3, "Walk"),
            ride(4, "VirtualRide"),
            ride(5, "EBikeRide"),
        ];
        let policy = ScanPolicy {
            max_activities_to_scan: 2,
            ..Default::default()
        };
        find_first_segment_set(&source, &activities, &policy, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), vec!["activity:2", "activity:4"]);
    }

    #[tokio::test]
    async fn test_count_occurrences() {
        let mut source = FakeSource::default();
        source.details.insert(
            1,
            detail(1, vec![effort(42, "A", 10), effort(99, "B", 20)]),
        );
        source.details.insert(2, detail(2, vec![effort(42, "A", 11)]));

        let activities = vec![ride(1, "Ride"), ride(2, "Ride"), ride(3, "Ride")];
        let counts = count_occurrences(
            &source,
            &activities,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(counts, SegmentCounts::from([(42, 2), (99, 1)]));
        // Activity 3 failed and was skipped, not fatal
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_scan_makes_no_calls() {
        let mut source = FakeSource::default();
        source.details.insert(1, detail(1, vec![effort(42, "A", 10)]));

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = count_occurrences(
            &source,
            &[ride(1, "Ride")],
            &ScanPolicy::default(),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_attach_geometry() {
        let mut source = FakeSource::default();
        let points = vec![LatLng::new(37.0, -122.0), LatLng::new(37.01, -122.01)];
        source.segments.insert(
            1,
            Segment {
                id: 1,
                total_elevation_gain: Some(55.0),
                map: Some(SegmentMap {
                    polyline: Some(polyline::encode(&points)),
                    summary_polyline: None,
                }),
                ..Default::default()
            },
        );
        source.segments.insert(
            2,
            Segment {
                id: 2,
                map: Some(SegmentMap {
                    polyline: Some(polyline::encode(&points[..1])),
                    summary_polyline: None,
                }),
                ..Default::default()
            },
        );

        let mut efforts = vec![effort(1, "A", 10), effort(2, "B", 20), effort(1, "A", 9), effort(3, "C", 5)];
        let set = attach_geometry(
            &source,
            &mut efforts,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(set.stats, PolylineStats { unique: 3, decoded: 1 });
        assert_eq!(set.geometries[0].segment_id, 1);
        assert_eq!(set.geometries[0].points.len(), 2);
        assert!(set.centre.is_some());
        assert_eq!(efforts[2].segment.total_elevation_gain, Some(55.0));
        assert_eq!(source.calls(), vec!["segment:1", "segment:2", "segment:3"]);
    }

    #[tokio::test]
    async fn test_attach_geometry_respects_cap() {
        let source = FakeSource::default();
        let mut efforts: Vec<_> = (1..=5).map(|id| effort(id, "S", 10)).collect();
        let policy = ScanPolicy {
            polyline_detail_cap: 2,
            ..Default::default()
        };
        attach_geometry(&source, &mut efforts, &policy, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_attach_leaderboards_separates_forbidden() {
        let mut source = FakeSource::default();
        source
            .leaderboards
            .insert(1, Ok(Leaderboard::new(vec![], 12)));
        source.leaderboards.insert(3, Err("bad".to_string()));
        source.forbidden.insert(2);

        let efforts = vec![effort(1, "A", 1), effort(2, "B", 2), effort(3, "C", 3)];
        let set = attach_leaderboards(
            &source,
            &efforts,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(set.leaderboards.len(), 1);
        assert_eq!(set.leaderboards[&1].effort_count, 12);
        assert_eq!(set.forbidden, vec![2]);
    }

    #[tokio::test]
    async fn test_lifetime_counts_paginate() {
        let mut source = FakeSource::default();
        source.effort_pages.insert(1, vec![200, 200, 200]);
        source.effort_pages.insert(2, vec![200, 37]);
        source.effort_pages.insert(3, vec![0]);

        let efforts = vec![effort(1, "A", 1), effort(2, "B", 2), effort(3, "C", 3), effort(4, "D", 4)];
        let known = SegmentCounts::from([(4, 2)]);
        let counts = lifetime_effort_counts(
            &source,
            &efforts,
            &known,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(counts[&1], 600);
        assert_eq!(counts[&2], 237);
        assert_eq!(counts[&3], 1);
        assert!(!counts.contains_key(&4));
        assert_eq!(
            source.calls(),
            vec![
                "efforts:1:1",
                "efforts:1:2",
                "efforts:1:3",
                "efforts:2:1",
                "efforts:2:2",
                "efforts:3:1"
            ]
        );
    }

    #[tokio::test]
    async fn test_weekly_unique_segments() {
        let mut source = FakeSource::default();
        source.details.insert(
            1,
            detail(1, vec![effort(7, "A", 1), effort(8, "B", 1)]),
        );
        source.details.insert(2, detail(2, vec![effort(7, "A", 2)]));

        let mut this_week = ride(1, "Ride");
        this_week.start_date = Utc.with_ymd_and_hms(2024, 1, 16, 8, 0, 0).unwrap();
        let mut monday = ride(2, "Run");
        monday.start_date = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mut last_week = ride(3, "Ride");
        last_week.start_date = Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 59).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 17, 12, 0, 0).unwrap();
        let weekly = weekly_unique_segments(
            &source,
            &[this_week, monday, last_week],
            now,
            &ScanPolicy::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(weekly.week_start, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(weekly.segment_ids, BTreeSet::from([7, 8]));
        assert_eq!(source.calls(), vec!["activity:1", "activity:2"]);
    }

    #[test]
    fn test_week_start_on_sunday() {
        let sunday = Utc.with_ymd_and_hms(2024, 1, 21, 22, 0, 0).unwrap();
        assert_eq!(
            week_start(sunday),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_best_times() {
        let efforts = vec![effort(1, "A", 300), effort(1, "A", 280), effort(2, "B", 90)];
        let best = best_times(&efforts);
        assert_eq!(best[&1], 280);
        assert_eq!(best[&2], 90);
    }

    #[test]
    fn test_elevation_precedence() {
        let segment = Segment {
            elev_difference: Some(120.0),
            total_elevation_gain: Some(999.0),
            ..Default::default()
        };
        assert_eq!(derive_elevation_gain(&segment), Some(120.0));

        let segment = Segment {
            total_elevation_gain: Some(80.0),
            elevation_high: Some(500.0),
            elevation_low: Some(100.0),
            ..Default::default()
        };
        assert_eq!(derive_elevation_gain(&segment), Some(80.0));

        let segment = Segment {
            elevation_high: Some(245.3),
            elevation_low: Some(92.4),
            ..Default::default()
        };
        let gain = derive_elevation_gain(&segment).unwrap();
        assert!((gain - 152.9).abs() < 1e-9);

        let downhill = Segment {
            elevation_high: Some(10.0),
            elevation_low: Some(50.0),
            ..Default::default()
        };
        assert_eq!(derive_elevation_gain(&downhill), Some(0.0));
        assert_eq!(derive_elevation_gain(&Segment::default()), None);
    }
}
