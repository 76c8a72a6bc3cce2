// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::Response;
use segment_scout::config::Config;
use segment_scout::db::CredentialStore;
use segment_scout::models::Credential;
use segment_scout::routes::create_router;
use segment_scout::AppState;
use std::sync::Arc;

/// Test config pointing all Strava traffic at `upstream`.
#[allow(dead_code)]
pub fn test_config(upstream: &str) -> Config {
    Config {
        strava_api_url: upstream.to_string(),
        strava_oauth_url: upstream.to_string(),
        geocoder_url: upstream.to_string(),
        ..Config::default()
    }
}

/// Create a test app backed by an in-memory credential store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(upstream: &str) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        test_config(upstream),
        CredentialStore::in_memory(),
    ));
    (create_router(state.clone()), state)
}

/// A credential that will not expire during the test.
#[allow(dead_code)]
pub fn credential(id: &str, token: &str) -> Credential {
    Credential {
        id: id.to_string(),
        athlete_id: Some(id.to_string()),
        name: format!("Rider {}", id),
        access_token: token.to_string(),
        refresh_token: Some(format!("refresh-{}", id)),
        expires_at: Some(chrono::Utc::now().timestamp() + 6 * 3600),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Body is not JSON")
}
