// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Request-quota knobs for scans. None of these affect correctness; they
/// bound how many upstream calls one scan may issue.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPolicy {
    /// Recent ride-type activities examined per scan
    pub max_activities_to_scan: usize,
    /// Segment detail lookups (for polylines) per scan
    pub polyline_detail_cap: usize,
    /// Leaderboard lookups per scan
    pub leaderboard_cap: usize,
    /// Page size when paging a segment's all-efforts list
    pub lifetime_page_size: u32,
    /// Maximum pages of all-efforts fetched per segment
    pub lifetime_max_pages: u32,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            max_activities_to_scan: 3,
            polyline_detail_cap: 30,
            leaderboard_cap: 10,
            lifetime_page_size: 200,
            lifetime_max_pages: 3,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Key used to sign the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth base URL
    pub strava_oauth_url: String,
    /// Geocoding service base URL (Nominatim-compatible)
    pub geocoder_url: String,
    /// Directory holding persisted credentials
    pub data_dir: PathBuf,
    /// Activities fetched per list request
    pub activity_page_size: u32,
    /// How long a fetched activity list stays cached
    pub activity_cache_ttl: Duration,
    /// Refresh tokens this long before they expire
    pub token_refresh_margin: Duration,
    pub scan: ScanPolicy,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            strava_api_url: "https://www.strava.com/api/v3".to_string(),
            strava_oauth_url: "https://www.strava.com/oauth".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            data_dir: PathBuf::from(".segment-scout"),
            activity_page_size: 3,
            activity_cache_ttl: Duration::from_secs(5 * 60),
            token_refresh_margin: Duration::from_secs(2 * 60),
            scan: ScanPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();
        let scan_defaults = ScanPolicy::default();

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            port: parsed("PORT", defaults.port)?,
            strava_api_url: env::var("STRAVA_API_URL").unwrap_or(defaults.strava_api_url),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL").unwrap_or(defaults.strava_oauth_url),
            geocoder_url: env::var("GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            activity_page_size: parsed("ACTIVITY_PAGE_SIZE", defaults.activity_page_size)?,
            activity_cache_ttl: Duration::from_secs(parsed(
                "ACTIVITY_CACHE_TTL_SECS",
                defaults.activity_cache_ttl.as_secs(),
            )?),
            token_refresh_margin: Duration::from_secs(parsed(
                "TOKEN_REFRESH_MARGIN_SECS",
                defaults.token_refresh_margin.as_secs(),
            )?),
            scan: ScanPolicy {
                max_activities_to_scan: parsed(
                    "SCAN_MAX_ACTIVITIES",
                    scan_defaults.max_activities_to_scan,
                )?,
                polyline_detail_cap: parsed(
                    "POLYLINE_DETAIL_CAP",
                    scan_defaults.polyline_detail_cap,
                )?,
                leaderboard_cap: parsed("LEADERBOARD_CAP", scan_defaults.leaderboard_cap)?,
                ..scan_defaults
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Parse an optional variable, falling back to `default` when unset.
fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
