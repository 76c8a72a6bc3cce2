// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Segment Scout: a local dashboard backend for Strava segments
//!
//! This crate connects one or more Strava accounts, scans recent rides for
//! segment efforts, and finds nearby segments with small leaderboards.

pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod polyline;
pub mod routes;
pub mod services;

use dashmap::DashMap;
use std::sync::Arc;

use config::Config;
use db::{ActivityCache, CredentialStore};
use services::{Geocoder, ScanSnapshot, SessionService, StravaClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<CredentialStore>,
    pub session: Arc<SessionService>,
    pub strava: StravaClient,
    pub geocoder: Geocoder,
    pub activity_cache: ActivityCache,
    /// Latest scan per credential ID
    pub scans: DashMap<String, ScanSnapshot>,
}

impl AppState {
    pub fn new(config: Config, store: CredentialStore) -> Self {
        let store = Arc::new(store);
        let strava = StravaClient::new(&config);
        let session = Arc::new(SessionService::new(
            store.clone(),
            strava.clone(),
            config.token_refresh_margin,
        ));

        Self {
            geocoder: Geocoder::new(&config.geocoder_url),
            activity_cache: ActivityCache::new(config.activity_cache_ttl),
            scans: DashMap::new(),
            config,
            store,
            session,
            strava,
        }
    }
}
