// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nearby segment search and the beatable-segment shortlist.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::cancel::CancelToken;
use crate::error::AppError;
use crate::models::{Leaderboard, LeaderboardEntry, SegmentId};
use crate::polyline::{self, LatLng};
use crate::services::aggregator::SegmentSource;
use crate::services::geocode::Geocoder;
use crate::services::ranking::{filter_beatable, HasEffortCount};
use crate::services::strava::{AuthorizedClient, Bounds, ExploreActivityType, ExploredSegment};

/// Kilometers per degree of latitude.
const KM_PER_DEGREE: f64 = 111.32;

/// Number of synthetic segments returned in demo mode.
const MOCK_SEGMENT_COUNT: usize = 8;

pub const NO_BEATABLE_NOTICE: &str =
    "No beatable segments found. Try increasing the max leaderboard size.";
pub const NO_SEGMENTS_NOTICE: &str =
    "No segments found in this area. Try increasing the radius or choosing a different location.";
pub const MISSING_LOCATION: &str = "Please enter an address or select a location on the map";

fn default_radius() -> f64 {
    5.0
}

fn default_max_results() -> u32 {
    50
}

/// Nearby search request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NearbyRequest {
    #[serde(default)]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
    /// Search radius in kilometers
    #[serde(default = "default_radius")]
    #[validate(range(min = 0.1, max = 50.0))]
    pub radius: f64,
    #[serde(default = "default_max_results", alias = "maxResults")]
    #[validate(range(min = 1, max = 200))]
    pub max_results: u32,
    #[serde(default, alias = "activityType")]
    pub activity_type: ExploreActivityType,
    #[serde(default)]
    pub mock: bool,
    #[serde(default, alias = "fetchEffortCounts")]
    pub fetch_effort_counts: bool,
    /// Beatable ceiling; when absent every candidate is returned
    #[serde(default, alias = "maxLeaderboard")]
    #[validate(range(min = 1))]
    pub max_leaderboard: Option<u64>,
}

/// A nearby candidate with leaderboard and personal comparison data.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NearbySegment {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: SegmentId,
    pub name: String,
    pub distance: f64,
    pub avg_grade: f64,
    pub elev_difference: Option<f64>,
    pub polyline: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub effort_count: Option<u64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub kom_time: Option<u64>,
    pub leaderboard_forbidden: bool,
    pub leaderboard_error: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub user_best_time: Option<u64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub seconds_behind_kom: Option<i64>,
    pub pct_behind: Option<f64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<[number, number]> | null"))]
    pub decoded_polyline: Option<Vec<LatLng>>,
}

impl From<ExploredSegment> for NearbySegment {
    fn from(s: ExploredSegment) -> Self {
        Self {
            id: s.id,
            name: s.name,
            distance: s.distance,
            avg_grade: s.avg_grade,
            elev_difference: s.elev_difference,
            polyline: s.points,
            effort_count: None,
            kom_time: None,
            leaderboard_forbidden: false,
            leaderboard_error: None,
            user_best_time: None,
            seconds_behind_kom: None,
            pct_behind: None,
            decoded_polyline: None,
        }
    }
}

impl HasEffortCount for NearbySegment {
    fn effort_count(&self) -> Option<u64> {
        self.effort_count
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyResponse {
    pub centre: LatLng,
    pub segments: Vec<NearbySegment>,
    /// Candidates before the beatable filter
    pub total_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Box extending `radius_km` from `centre` in each direction.
pub fn bounds_around(centre: LatLng, radius_km: f64) -> Bounds {
    let dlat = radius_km / KM_PER_DEGREE;
    let dlng = radius_km / (KM_PER_DEGREE * centre.lat.to_radians().cos().abs().max(0.01));
    Bounds {
        south: centre.lat - dlat,
        west: centre.lng - dlng,
        north: centre.lat + dlat,
        east: centre.lng + dlng,
    }
}

/// Search centre from explicit coordinates, else by geocoding the address.
pub async fn resolve_centre(
    request: &NearbyRequest,
    geocoder: &Geocoder,
) -> Result<LatLng, AppError> {
    if let (Some(lat), Some(lng)) = (request.lat, request.lng) {
        return Ok(LatLng::new(lat, lng));
    }
    match request.address.as_deref().map(str::trim) {
        Some(address) if !address.is_empty() => geocoder.geocode(address).await,
        _ => Err(AppError::BadRequest(MISSING_LOCATION.to_string())),
    }
}

/// Deterministic demo segments scattered around `centre`.
pub fn mock_segments(centre: LatLng, count: usize) -> Vec<ExploredSegment> {
    (0..count.min(MOCK_SEGMENT_COUNT))
        .map(|i| {
            let step = i as f64;
            let angle = step * std::f64::consts::TAU / MOCK_SEGMENT_COUNT as f64;
            let start = LatLng::new(
                centre.lat + 0.01 * angle.sin(),
                centre.lng + 0.01 * angle.cos(),
            );
            let points: Vec<LatLng> = (0..5)
                .map(|k| {
                    let k = k as f64;
                    LatLng::new(start.lat + 0.001 * k, start.lng + 0.0008 * k * (1.0 + step / 4.0))
                })
                .collect();

            let distance = 800.0 + 350.0 * step;
            let avg_grade = 2.0 + 0.7 * step;
            ExploredSegment {
                id: 9_000_000 + i as SegmentId,
                name: format!("Demo Segment {}", i + 1),
                distance,
                avg_grade,
                elev_difference: Some((distance * avg_grade / 100.0).round()),
                points: Some(polyline::encode(&points)),
            }
        })
        .collect()
}

/// Deterministic demo leaderboard for a segment.
pub fn mock_leaderboard(segment_id: SegmentId) -> Leaderboard {
    const NAMES: [&str; 5] = ["A. Rider", "B. Climber", "C. Sprinter", "D. Cruiser", "E. Tourer"];
    let base = 180 + segment_id % 97;
    let entries = NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| LeaderboardEntry {
            rank: i as u32 + 1,
            athlete_name: name.to_string(),
            elapsed_time: base + 9 * i as u64,
        })
        .collect();
    Leaderboard::new(entries, 3 + segment_id % 23)
}

/// Fetch each candidate's leaderboard in turn and record its size.
pub async fn annotate_effort_counts<S: SegmentSource + ?Sized>(
    source: &S,
    segments: &mut [NearbySegment],
    cancel: &CancelToken,
) -> Result<(), AppError> {
    for segment in segments.iter_mut() {
        match cancel.run(source.leaderboard(segment.id)).await {
            Ok(board) => apply_leaderboard(segment, &board),
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(AppError::LeaderboardForbidden(_)) => segment.leaderboard_forbidden = true,
            Err(e) => {
                tracing::warn!(segment_id = segment.id, error = %e, "Leaderboard fetch failed");
                segment.leaderboard_error = Some(e.to_string());
            }
        }
    }
    Ok(())
}

fn apply_leaderboard(segment: &mut NearbySegment, board: &Leaderboard) {
    segment.effort_count = Some(board.effort_count);
    segment.kom_time = board.kom_time;
}

/// Attach decoded routes and the comparison against the user's best times.
pub fn enrich(segments: &mut [NearbySegment], best_times: &HashMap<SegmentId, u64>) {
    for segment in segments.iter_mut() {
        segment.decoded_polyline = segment
            .polyline
            .as_deref()
            .and_then(polyline::route_geometry);

        segment.user_best_time = best_times.get(&segment.id).copied();
        if let (Some(best), Some(kom)) = (segment.user_best_time, segment.kom_time) {
            let behind = best as i64 - kom as i64;
            segment.seconds_behind_kom = Some(behind);
            segment.pct_behind = Some(behind as f64 / kom.max(1) as f64 * 100.0);
        }
    }
}

/// Apply the beatable ceiling and pick the notice to show.
pub fn finish(
    centre: LatLng,
    segments: Vec<NearbySegment>,
    max_leaderboard: Option<u64>,
) -> NearbyResponse {
    let total_found = segments.len();
    let segments = match max_leaderboard {
        Some(ceiling) => filter_beatable(segments, ceiling),
        None => segments,
    };

    let notice = if total_found == 0 {
        Some(NO_SEGMENTS_NOTICE.to_string())
    } else if segments.is_empty() {
        Some(NO_BEATABLE_NOTICE.to_string())
    } else {
        None
    };

    NearbyResponse {
        centre,
        segments,
        total_found,
        notice,
    }
}

/// Run a nearby search.
///
/// `client` may be `None` only in demo mode.
pub async fn search(
    client: Option<&AuthorizedClient>,
    geocoder: &Geocoder,
    request: &NearbyRequest,
    best_times: &HashMap<SegmentId, u64>,
    cancel: &CancelToken,
) -> Result<NearbyResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let centre = resolve_centre(request, geocoder).await?;
    let max_results = request.max_results as usize;

    let mut segments: Vec<NearbySegment> = if request.mock {
        mock_segments(centre, max_results)
            .into_iter()
            .map(|s| {
                let mut segment = NearbySegment::from(s);
                let board = mock_leaderboard(segment.id);
                apply_leaderboard(&mut segment, &board);
                segment
            })
            .collect()
    } else {
        let client = client.ok_or(AppError::NoCredential)?;
        let bounds = bounds_around(centre, request.radius);
        let explored = cancel
            .run(client.client().explore_segments(
                client.access_token(),
                &bounds,
                request.activity_type,
            ))
            .await?;
        let mut segments: Vec<NearbySegment> = explored
            .into_iter()
            .take(max_results)
            .map(NearbySegment::from)
            .collect();
        if request.fetch_effort_counts {
            annotate_effort_counts(client, &mut segments, cancel).await?;
        }
        segments
    };

    tracing::info!(
        lat = centre.lat,
        lng = centre.lng,
        radius_km = request.radius,
        found = segments.len(),
        mock = request.mock,
        "Nearby search"
    );

    enrich(&mut segments, best_times);
    Ok(finish(centre, segments, request.max_leaderboard))
}

/// Result of probing a segment's detail and leaderboard endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentAccessReport {
    pub segment_id: SegmentId,
    pub segment_status: u16,
    pub leaderboard_status: u16,
    pub forbidden: bool,
    pub note: String,
}

/// Check whether the token can read a segment and its leaderboard.
pub async fn test_segment_access(
    client: &AuthorizedClient,
    segment_id: SegmentId,
) -> Result<SegmentAccessReport, AppError> {
    let token = client.access_token();
    let segment_status = client
        .client()
        .status_of(token, &format!("/segments/{}", segment_id))
        .await?;
    let leaderboard_status = client
        .client()
        .status_of(token, &format!("/segments/{}/leaderboard", segment_id))
        .await?;

    let forbidden = leaderboard_status == 403;
    let note = match (segment_status, leaderboard_status) {
        (_, 403) => AppError::REAUTHORIZE_HINT.to_string(),
        (200, 200) => "Segment and leaderboard are accessible.".to_string(),
        (200, status) => format!("Leaderboard returned HTTP {}.", status),
        (status, _) => format!("Segment returned HTTP {}.", status),
    };

    tracing::info!(segment_id, segment_status, leaderboard_status, "Segment access check");
    Ok(SegmentAccessReport {
        segment_id,
        segment_status,
        leaderboard_status,
        forbidden,
        note,
    })
}
