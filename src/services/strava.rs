// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Recent activities and activity detail with all segment efforts
//! - Segment detail, paginated all-efforts, leaderboards, explore
//! - OAuth code exchange and token refresh
//! - Error classification (rate limit, rejected token, forbidden leaderboard)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    ActivitySummary, DetailedActivity, Leaderboard, LeaderboardEntry, Segment, SegmentId,
};
use crate::services::aggregator::SegmentSource;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.strava_api_url.trim_end_matches('/').to_string(),
            oauth_url: config.strava_oauth_url.trim_end_matches('/').to_string(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        }
    }

    /// Bind an access token, producing a [`SegmentSource`] for scans.
    pub fn authorized(&self, access_token: impl Into<String>) -> AuthorizedClient {
        AuthorizedClient {
            client: self.clone(),
            access_token: access_token.into(),
        }
    }

    /// List the athlete's most recent activities.
    ///
    /// Strava occasionally answers with an error object instead of an
    /// array; that is reported as an unexpected response.
    pub async fn list_activities(
        &self,
        access_token: &str,
        per_page: u32,
    ) -> Result<Vec<ActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("per_page", per_page.to_string())])
            .send()
            .await
            .map_err(transport)?;

        let body: Value = self.check_response_json(response).await?;
        if body.is_array() {
            return serde_json::from_value(body).map_err(|e| {
                AppError::UnexpectedResponse(format!("Malformed activity list: {}", e))
            });
        }

        match body.get("message").and_then(Value::as_str) {
            Some(message) => Err(AppError::UnexpectedResponse(format!(
                "Strava API error: {}",
                message
            ))),
            None => Err(AppError::UnexpectedResponse(
                "Unexpected activities response (not an array).".to_string(),
            )),
        }
    }

    /// Get an activity with every segment effort.
    pub async fn get_activity_detail(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<DetailedActivity, AppError> {
        let url = format!(
            "{}/activities/{}?include_all_efforts=true",
            self.base_url, activity_id
        );
        self.get_json(&url, access_token).await
    }

    /// Get segment detail, including its polyline.
    pub async fn get_segment(
        &self,
        access_token: &str,
        segment_id: SegmentId,
    ) -> Result<Segment, AppError> {
        let url = format!("{}/segments/{}", self.base_url, segment_id);
        self.get_json(&url, access_token).await
    }

    /// One page of the athlete's efforts on a segment.
    pub async fn list_segment_efforts(
        &self,
        access_token: &str,
        segment_id: SegmentId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<EffortRef>, AppError> {
        let url = format!("{}/segments/{}/all_efforts", self.base_url, segment_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;

        self.check_response_json(response).await
    }

    /// Get a segment leaderboard.
    ///
    /// A 403 is reported as [`AppError::LeaderboardForbidden`] so callers
    /// can distinguish a scope problem from other failures.
    pub async fn get_leaderboard(
        &self,
        access_token: &str,
        segment_id: SegmentId,
    ) -> Result<Leaderboard, AppError> {
        let url = format!("{}/segments/{}/leaderboard", self.base_url, segment_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| "Forbidden".to_string());
            tracing::warn!(segment_id, %message, "Leaderboard forbidden");
            return Err(AppError::LeaderboardForbidden(message));
        }

        let raw: RawLeaderboard = self.check_response_json(response).await?;
        Ok(raw.into_leaderboard())
    }

    /// Find popular segments inside `bounds`.
    pub async fn explore_segments(
        &self,
        access_token: &str,
        bounds: &Bounds,
        activity_type: ExploreActivityType,
    ) -> Result<Vec<ExploredSegment>, AppError> {
        let url = format!("{}/segments/explore", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("bounds", bounds.to_query()),
                ("activity_type", activity_type.as_str().to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let explored: ExploreResponse = self.check_response_json(response).await?;
        Ok(explored.segments)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(transport)?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(transport)?;

        self.check_response_json(response).await
    }

    /// Authorize URL the browser is sent to.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
            self.oauth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode("read,activity:read_all"),
            urlencoding::encode(state),
        )
    }

    /// GET a URL and return only the status code.
    pub async fn status_of(&self, access_token: &str, path: &str) -> Result<u16, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;
        Ok(response.status().as_u16())
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::RateLimited);
            }

            if status.as_u16() == 401 {
                return Err(AppError::TokenRejected);
            }

            let message = error_message(&body).unwrap_or(body);
            return Err(AppError::StravaApi {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::UnexpectedResponse(format!("JSON parse error: {}", e)))
    }
}

fn transport(e: reqwest::Error) -> AppError {
    AppError::Transport(e.to_string())
}

/// Extract `message` from a Strava error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ─── Segment source binding ──────────────────────────────────────────────────

/// A client with a bound access token.
#[derive(Clone)]
pub struct AuthorizedClient {
    client: StravaClient,
    access_token: String,
}

impl AuthorizedClient {
    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

#[async_trait]
impl SegmentSource for AuthorizedClient {
    async fn activity_detail(&self, activity_id: u64) -> Result<DetailedActivity, AppError> {
        self.client
            .get_activity_detail(&self.access_token, activity_id)
            .await
    }

    async fn segment(&self, segment_id: SegmentId) -> Result<Segment, AppError> {
        self.client.get_segment(&self.access_token, segment_id).await
    }

    async fn leaderboard(&self, segment_id: SegmentId) -> Result<Leaderboard, AppError> {
        self.client
            .get_leaderboard(&self.access_token, segment_id)
            .await
    }

    async fn effort_page(
        &self,
        segment_id: SegmentId,
        page: u32,
        per_page: u32,
    ) -> Result<usize, AppError> {
        self.client
            .list_segment_efforts(&self.access_token, segment_id, page, per_page)
            .await
            .map(|efforts| efforts.len())
    }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Rectangular search area in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// `sw_lat,sw_lng,ne_lat,ne_lng` as expected by the explore endpoint.
    pub fn to_query(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

/// Explore endpoint activity filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExploreActivityType {
    #[default]
    Riding,
    Running,
}

impl ExploreActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExploreActivityType::Riding => "riding",
            ExploreActivityType::Running => "running",
        }
    }
}

/// Segment as returned by the explore endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploredSegment {
    pub id: SegmentId,
    pub name: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub avg_grade: f64,
    #[serde(default)]
    pub elev_difference: Option<f64>,
    /// Encoded polyline
    #[serde(default)]
    pub points: Option<String>,
}

#[derive(Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    segments: Vec<ExploredSegment>,
}

/// Minimal all-efforts row; only the count matters.
#[derive(Debug, Clone, Deserialize)]
pub struct EffortRef {
    pub id: u64,
    #[serde(default)]
    pub elapsed_time: u64,
}

#[derive(Deserialize)]
struct RawLeaderboard {
    #[serde(default)]
    effort_count: Option<u64>,
    #[serde(default)]
    entry_count: Option<u64>,
    #[serde(default)]
    entries: Vec<RawLeaderboardEntry>,
}

#[derive(Deserialize)]
struct RawLeaderboardEntry {
    #[serde(default)]
    rank: u32,
    #[serde(default)]
    athlete_name: String,
    #[serde(default)]
    elapsed_time: u64,
}

impl RawLeaderboard {
    fn into_leaderboard(self) -> Leaderboard {
        let effort_count = self
            .effort_count
            .or(self.entry_count)
            .unwrap_or(self.entries.len() as u64);
        let entries = self
            .entries
            .into_iter()
            .map(|e| LeaderboardEntry {
                rank: e.rank,
                athlete_name: e.athlete_name,
                elapsed_time: e.elapsed_time,
            })
            .collect();
        Leaderboard::new(entries, effort_count)
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub athlete: Option<StravaAthlete>,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}
