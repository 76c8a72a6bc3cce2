// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Segment table scans and their per-credential snapshots.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::AppError;
use crate::models::{ActiveCredential, ActivitySummary, Leaderboard, SegmentEffort, SegmentId};
use crate::polyline::LatLng;
use crate::services::aggregator::{
    self, GeometrySet, PolylineStats, ScanDiagnostics, SegmentCounts, SegmentGeometry,
    SegmentSource,
};
use crate::services::ranking::{sort_efforts, SortContext, SortField, SortState};
use crate::AppState;

/// Everything the last scan for one credential produced.
#[derive(Clone)]
pub struct ScanSnapshot {
    pub source_activity: Option<u64>,
    pub efforts: Vec<SegmentEffort>,
    pub geometry: GeometrySet,
    pub leaderboards: HashMap<SegmentId, Leaderboard>,
    pub forbidden: Vec<SegmentId>,
    pub diagnostics: ScanDiagnostics,
    pub sort: SortState,
    /// Occurrence counts from the background task, once finished
    pub counts: Option<SegmentCounts>,
    /// All-efforts fallback counts
    pub lifetime_counts: SegmentCounts,
    /// Cancels the background count task
    pub counts_task: CancelToken,
}

/// One row of the segment table.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRow {
    #[serde(flatten)]
    pub effort: SegmentEffort,
    pub count: Option<u32>,
    pub elevation_gain: Option<f64>,
    pub kom_time: Option<u64>,
    pub effort_count: Option<u64>,
    pub leaderboard_forbidden: bool,
}

/// Sorted segment table as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ScanView {
    pub source_activity: Option<u64>,
    pub sort: SortState,
    pub rows: Vec<SegmentRow>,
    pub geometries: Vec<SegmentGeometry>,
    pub centre: Option<LatLng>,
    pub polyline_stats: PolylineStats,
    pub diagnostics: ScanDiagnostics,
    pub counts_ready: bool,
}

impl ScanSnapshot {
    /// Background counts overlaid with lifetime counts for missing rows.
    pub fn merged_counts(&self) -> SegmentCounts {
        let mut merged = self.lifetime_counts.clone();
        if let Some(counts) = &self.counts {
            merged.extend(counts.iter().map(|(id, n)| (*id, *n)));
        }
        merged
    }

    pub fn view(&self) -> ScanView {
        let counts = self.merged_counts();
        let ctx = SortContext {
            counts: Some(&counts),
            leaderboards: Some(&self.leaderboards),
        };

        let mut efforts = self.efforts.clone();
        sort_efforts(&mut efforts, self.sort, &ctx);

        let rows = efforts
            .into_iter()
            .map(|effort| {
                let id = effort.segment.id;
                let board = self.leaderboards.get(&id);
                SegmentRow {
                    count: counts.get(&id).copied(),
                    elevation_gain: aggregator::derive_elevation_gain(&effort.segment),
                    kom_time: board.and_then(|b| b.kom_time),
                    effort_count: board.map(|b| b.effort_count),
                    leaderboard_forbidden: self.forbidden.contains(&id),
                    effort,
                }
            })
            .collect();

        ScanView {
            source_activity: self.source_activity,
            sort: self.sort,
            rows,
            geometries: self.geometry.geometries.clone(),
            centre: self.geometry.centre,
            polyline_stats: self.geometry.stats,
            diagnostics: self.diagnostics.clone(),
            counts_ready: self.counts.is_some(),
        }
    }

    /// Fastest elapsed time per segment in this scan.
    pub fn best_times(&self) -> HashMap<SegmentId, u64> {
        aggregator::best_times(&self.efforts)
    }
}

/// Recent activities for a credential, served from cache when fresh.
pub async fn recent_activities(
    state: &AppState,
    credential: &ActiveCredential,
) -> Result<Arc<Vec<ActivitySummary>>, AppError> {
    if let Some(cached) = state.activity_cache.get(&credential.id) {
        tracing::debug!(id = %credential.id, "Activity cache hit");
        return Ok(cached);
    }

    let activities = state
        .strava
        .list_activities(&credential.access_token, state.config.activity_page_size)
        .await?;
    tracing::debug!(id = %credential.id, count = activities.len(), "Fetched recent activities");
    Ok(state.activity_cache.insert(&credential.id, activities))
}

/// Scan recent rides for a credential, store the snapshot, and start the
/// background occurrence count.
///
/// Any previous background count for the credential is cancelled.
pub async fn run_scan(
    state: &Arc<AppState>,
    credential: &ActiveCredential,
    cancel: &CancelToken,
) -> Result<ScanView, AppError> {
    if let Some(previous) = state.scans.get(&credential.id) {
        previous.counts_task.cancel();
    }

    let activities = cancel.run(recent_activities(state, credential)).await?;
    let source = state.strava.authorized(credential.access_token.clone());
    let policy = &state.config.scan;

    let first = aggregator::find_first_segment_set(&source, &activities, policy, cancel).await?;
    let mut efforts = first.efforts;

    let (geometry, boards) = if efforts.is_empty() {
        (GeometrySet::default(), Default::default())
    } else {
        let geometry = aggregator::attach_geometry(&source, &mut efforts, policy, cancel).await?;
        let boards = aggregator::attach_leaderboards(&source, &efforts, policy, cancel).await?;
        (geometry, boards)
    };

    let mut diagnostics = first.diagnostics;
    if !efforts.is_empty() {
        diagnostics.polyline_stats = Some(geometry.stats);
    }

    tracing::info!(
        id = %credential.id,
        activity = ?first.source_activity,
        efforts = efforts.len(),
        decoded = geometry.stats.decoded,
        forbidden = boards.forbidden.len(),
        "Scan complete"
    );

    let counts_task = CancelToken::new();
    let snapshot = ScanSnapshot {
        source_activity: first.source_activity,
        efforts,
        geometry,
        leaderboards: boards.leaderboards,
        forbidden: boards.forbidden,
        diagnostics,
        sort: SortState::default(),
        counts: None,
        lifetime_counts: SegmentCounts::new(),
        counts_task: counts_task.clone(),
    };
    let view = snapshot.view();
    state.scans.insert(credential.id.clone(), snapshot);

    spawn_occurrence_count(
        state.clone(),
        credential.id.clone(),
        source,
        activities,
        counts_task,
    );

    Ok(view)
}

/// Count segment occurrences in the background and merge them into the
/// credential's snapshot when done.
pub fn spawn_occurrence_count<S: SegmentSource + 'static>(
    state: Arc<AppState>,
    credential_id: String,
    source: S,
    activities: Arc<Vec<ActivitySummary>>,
    cancel: CancelToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let result =
            aggregator::count_occurrences(&source, &activities, &state.config.scan, &cancel).await;

        match result {
            Ok(counts) => {
                if let Some(mut snapshot) = state.scans.get_mut(&credential_id) {
                    // A newer scan has replaced this one
                    if cancel.is_cancelled() {
                        return;
                    }
                    tracing::debug!(id = %credential_id, segments = counts.len(), "Occurrence counts ready");
                    snapshot.counts = Some(counts);
                }
            }
            Err(AppError::Cancelled) => {
                tracing::debug!(id = %credential_id, "Occurrence count cancelled");
            }
            Err(e) => {
                tracing::warn!(id = %credential_id, error = %e, "Occurrence count failed");
            }
        }
    })
}

/// Apply a sort toggle to the stored snapshot and return the new view.
pub fn toggle_sort(
    state: &AppState,
    credential_id: &str,
    field: Option<SortField>,
) -> Result<ScanView, AppError> {
    let mut snapshot = state
        .scans
        .get_mut(credential_id)
        .ok_or_else(|| AppError::NotFound("No scan for this credential yet".to_string()))?;

    if let Some(field) = field {
        snapshot.sort = snapshot.sort.toggle(field);
    }
    Ok(snapshot.view())
}

/// Fill lifetime counts for rows the scan window did not count.
pub async fn fill_lifetime_counts(
    state: &AppState,
    credential: &ActiveCredential,
    cancel: &CancelToken,
) -> Result<SegmentCounts, AppError> {
    let (efforts, known) = {
        let snapshot = state
            .scans
            .get(&credential.id)
            .ok_or_else(|| AppError::NotFound("No scan for this credential yet".to_string()))?;
        (snapshot.efforts.clone(), snapshot.merged_counts())
    };

    let source = state.strava.authorized(credential.access_token.clone());
    let fetched = aggregator::lifetime_effort_counts(
        &source,
        &efforts,
        &known,
        &state.config.scan,
        cancel,
    )
    .await?;

    if let Some(mut snapshot) = state.scans.get_mut(&credential.id) {
        snapshot
            .lifetime_counts
            .extend(fetched.iter().map(|(id, n)| (*id, *n)));
        return Ok(snapshot.merged_counts());
    }
    Ok(fetched)
}
