// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Address lookup against a Nominatim-compatible geocoder.

use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::polyline::LatLng;

const USER_AGENT: &str = concat!("segment-scout/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Geocoder {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Best match for `address`, or `NotFound`.
    pub async fn geocode(&self, address: &str) -> Result<LatLng, AppError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::UnexpectedResponse(format!(
                "Geocoder returned HTTP {}",
                response.status()
            )));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| AppError::UnexpectedResponse(format!("Geocoder response: {}", e)))?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("No location found for '{}'", address)))?;

        let lat = place.lat.parse::<f64>();
        let lng = place.lon.parse::<f64>();
        match (lat, lng) {
            (Ok(lat), Ok(lng)) => {
                tracing::debug!(address, lat, lng, "Address geocoded");
                Ok(LatLng::new(lat, lng))
            }
            _ => Err(AppError::UnexpectedResponse(
                "Geocoder returned non-numeric coordinates".to_string(),
            )),
        }
    }
}
