// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for activities, segment scans, and nearby search.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::{AppError, Result};
use crate::middleware::auth::resolve_credential;
use crate::models::{ActiveCredential, ActivitySummary, Leaderboard, SegmentId};
use crate::services::aggregator::{self, SegmentCounts};
use crate::services::nearby::{self, NearbyRequest, NearbyResponse, SegmentAccessReport};
use crate::services::ranking::SortField;
use crate::services::scan::{self, ScanView};
use crate::AppState;

/// Routes that need a resolved credential.
/// The credential middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(get_activities))
        .route("/api/scan", post(start_scan).get(get_scan))
        .route("/api/scan/counts", get(get_counts))
        .route("/api/scan/lifetime-counts", post(lifetime_counts))
        .route("/api/stats/weekly", get(weekly_stats))
        .route("/api/segments/test", post(test_segment))
}

/// Routes where a credential is optional (demo data works without one).
pub fn open_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/segments/{id}/leaderboard", get(get_leaderboard))
        .route("/api/segments/nearby", post(nearby_search))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivitySummary>,
    /// How many of the activities are ride types
    pub rides: usize,
}

/// Recent activities for the active credential.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
) -> Result<Json<ActivitiesResponse>> {
    let activities = scan::recent_activities(&state, &credential).await?;
    let rides = activities.iter().filter(|a| a.is_ride()).count();

    Ok(Json(ActivitiesResponse {
        activities: activities.as_ref().clone(),
        rides,
    }))
}

// ─── Segment Scan ────────────────────────────────────────────

/// Scan recent rides. Abandoning the request cancels the scan.
async fn start_scan(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
) -> Result<Json<ScanView>> {
    let cancel = CancelToken::new();
    let _guard = cancel.drop_guard();

    let view = scan::run_scan(&state, &credential, &cancel).await?;
    Ok(Json(view))
}

#[derive(Deserialize)]
struct ScanQuery {
    sort: Option<SortField>,
}

/// Current segment table; `?sort=` toggles the ordering.
async fn get_scan(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<ScanView>> {
    Ok(Json(scan::toggle_sort(&state, &credential.id, query.sort)?))
}

#[derive(Serialize)]
pub struct CountsResponse {
    pub ready: bool,
    pub counts: SegmentCounts,
}

/// Occurrence counts; `ready` is false while the background task runs.
async fn get_counts(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
) -> Result<Json<CountsResponse>> {
    let snapshot = state
        .scans
        .get(&credential.id)
        .ok_or_else(|| AppError::NotFound("No scan for this credential yet".to_string()))?;

    Ok(Json(CountsResponse {
        ready: snapshot.counts.is_some(),
        counts: snapshot.merged_counts(),
    }))
}

/// Lifetime effort counts for rows without an occurrence count.
async fn lifetime_counts(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
) -> Result<Json<CountsResponse>> {
    let cancel = CancelToken::new();
    let _guard = cancel.drop_guard();

    let counts = scan::fill_lifetime_counts(&state, &credential, &cancel).await?;
    Ok(Json(CountsResponse {
        ready: true,
        counts,
    }))
}

#[derive(Serialize)]
pub struct WeeklyResponse {
    pub week_start: DateTime<Utc>,
    pub unique_segments: usize,
    pub segment_ids: Vec<SegmentId>,
}

/// Distinct segments ridden so far this week.
async fn weekly_stats(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
) -> Result<Json<WeeklyResponse>> {
    let cancel = CancelToken::new();
    let _guard = cancel.drop_guard();

    let activities = scan::recent_activities(&state, &credential).await?;
    let source = state.strava.authorized(credential.access_token.clone());
    let weekly = aggregator::weekly_unique_segments(
        &source,
        &activities,
        Utc::now(),
        &state.config.scan,
        &cancel,
    )
    .await?;

    Ok(Json(WeeklyResponse {
        week_start: weekly.week_start,
        unique_segments: weekly.segment_ids.len(),
        segment_ids: weekly.segment_ids.into_iter().collect(),
    }))
}

// ─── Segments ────────────────────────────────────────────────

#[derive(Deserialize)]
struct LeaderboardQuery {
    #[serde(default)]
    mock: bool,
}

/// Leaderboard for one segment, or a demo leaderboard with `?mock=true`.
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(segment_id): Path<SegmentId>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>> {
    if query.mock {
        return Ok(Json(nearby::mock_leaderboard(segment_id)));
    }

    let credential = resolve_credential(&state, &headers).await?;
    let board = state
        .strava
        .get_leaderboard(&credential.access_token, segment_id)
        .await?;
    Ok(Json(board))
}

/// Nearby segment search.
async fn nearby_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<NearbyRequest>,
) -> Result<Json<NearbyResponse>> {
    let cancel = CancelToken::new();
    let _guard = cancel.drop_guard();

    let credential = if request.mock {
        resolve_credential(&state, &headers).await.ok()
    } else {
        Some(resolve_credential(&state, &headers).await?)
    };

    let best_times: HashMap<SegmentId, u64> = credential
        .as_ref()
        .and_then(|c| state.scans.get(&c.id).map(|s| s.best_times()))
        .unwrap_or_default();

    let client = credential
        .as_ref()
        .map(|c| state.strava.authorized(c.access_token.clone()));

    let response = nearby::search(
        client.as_ref(),
        &state.geocoder,
        &request,
        &best_times,
        &cancel,
    )
    .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestSegmentRequest {
    segment_id: SegmentId,
}

/// Check whether the active token can read a segment and its leaderboard.
async fn test_segment(
    State(state): State<Arc<AppState>>,
    Extension(credential): Extension<ActiveCredential>,
    Json(request): Json<TestSegmentRequest>,
) -> Result<Json<SegmentAccessReport>> {
    let client = state.strava.authorized(credential.access_token);
    let report = nearby::test_segment_access(&client, request.segment_id).await?;
    Ok(Json(report))
}
