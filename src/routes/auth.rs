// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth routes and token endpoints.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::services::strava::{StravaAthlete, TokenRefreshResponse};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
        .route("/api/exchange", post(exchange))
        .route("/api/refresh", post(refresh))
}

#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Where the browser lands once the account is connected;
    /// defaults to the configured frontend.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Sign `frontend_url` into an opaque OAuth state value.
fn sign_state(frontend_url: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Frontend URL carried by a state value, if its signature checks out.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex". Split from the
    // right so a '|' inside the URL stays part of it.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let payload = format!("{}|{}", frontend_url, timestamp_hex);
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(signature_hex.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Callback URL derived from the request's Host header.
fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/strava/callback", scheme, host)
}

/// Send the browser to Strava to connect an account.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let oauth_state = sign_state(&frontend_url, timestamp, &state.config.oauth_state_key)?;
    let auth_url = state
        .strava
        .authorize_url(&callback_url(&headers), &oauth_state);

    tracing::info!(
        client_id = %state.config.strava_client_id,
        frontend_url = %frontend_url,
        "Redirecting to Strava to connect an account"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and store the credential.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let frontend_url = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Unverifiable OAuth state, redirecting to the configured frontend"
            );
            state.config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let (credential, _) = state.session.exchange_code(&code).await?;

    let redirect_url = format!(
        "{}/callback?credential_id={}",
        frontend_url,
        urlencoding::encode(&credential.id)
    );
    Ok(Redirect::temporary(&redirect_url))
}

// ─── Token Endpoints ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct ExchangeRequest {
    code: String,
}

#[derive(Serialize)]
pub struct ExchangeResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub athlete: Option<StravaAthlete>,
    pub credential_id: String,
}

/// Exchange an authorization code obtained by the client.
async fn exchange(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>> {
    if request.code.trim().is_empty() {
        return Err(AppError::BadRequest("Missing authorization code".to_string()));
    }

    let (credential, response) = state.session.exchange_code(request.code.trim()).await?;
    Ok(Json(ExchangeResponse {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: response.expires_at,
        athlete: response.athlete,
        credential_id: credential.id,
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

/// Refresh a token pair on behalf of the client.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenRefreshResponse>> {
    if request.refresh_token.trim().is_empty() {
        return Err(AppError::BadRequest("Missing refresh token".to_string()));
    }

    let refreshed = state.strava.refresh_token(request.refresh_token.trim()).await?;
    Ok(Json(refreshed))
}
