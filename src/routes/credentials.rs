// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential management routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::{Credential, CredentialView};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/credentials",
            get(list_credentials)
                .post(upsert_credential)
                .delete(clear_credentials),
        )
        .route("/api/credentials/current", put(select_current))
        .route("/api/credentials/{id}", delete(remove_credential))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CredentialsResponse {
    pub credentials: Vec<CredentialView>,
    pub current_id: Option<String>,
}

/// List stored credentials with masked tokens.
async fn list_credentials(State(state): State<Arc<AppState>>) -> Json<CredentialsResponse> {
    let current_id = state.store.current_id().await;
    let credentials = state
        .store
        .list()
        .await
        .iter()
        .map(|c| CredentialView::new(c, current_id.as_deref() == Some(c.id.as_str())))
        .collect();

    Json(CredentialsResponse {
        credentials,
        current_id,
    })
}

/// Manually entered credential.
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(min = 1))]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub athlete_id: Option<String>,
}

/// Add or update a credential; it becomes current.
async fn upsert_credential(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialRequest>,
) -> Result<(StatusCode, Json<CredentialView>)> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let id = request
        .id
        .or_else(|| request.athlete_id.clone())
        .unwrap_or_else(|| format!("manual-{}", chrono::Utc::now().timestamp_millis()));

    let stored = state
        .store
        .upsert(Credential {
            id,
            athlete_id: request.athlete_id,
            name: request.name.trim().to_string(),
            access_token: request.access_token.trim().to_string(),
            refresh_token: request.refresh_token.filter(|t| !t.is_empty()),
            expires_at: request.expires_at,
        })
        .await?;

    state.activity_cache.invalidate(&stored.id);
    Ok((StatusCode::CREATED, Json(CredentialView::new(&stored, true))))
}

#[derive(Deserialize)]
pub struct SelectRequest {
    id: String,
}

/// Switch the current credential.
async fn select_current(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<CredentialView>> {
    let selected = state.store.select_current(&request.id).await?;
    tracing::info!(id = %selected.id, "Current credential selected");
    Ok(Json(CredentialView::new(&selected, true)))
}

/// Remove one credential and everything cached for it.
async fn remove_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.store.remove(&id).await? {
        return Err(AppError::NotFound(format!("Credential {} not found", id)));
    }

    state.activity_cache.invalidate(&id);
    if let Some((_, snapshot)) = state.scans.remove(&id) {
        snapshot.counts_task.cancel();
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every credential.
async fn clear_credentials(State(state): State<Arc<AppState>>) -> Result<StatusCode> {
    for credential in state.store.list().await {
        state.activity_cache.invalidate(&credential.id);
    }
    for entry in state.scans.iter() {
        entry.counts_task.cancel();
    }
    state.scans.clear();
    state.store.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
