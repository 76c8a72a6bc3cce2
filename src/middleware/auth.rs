// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential resolution middleware.

use crate::error::AppError;
pub use crate::models::ActiveCredential;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Header selecting a stored credential for one request.
pub const CREDENTIAL_HEADER: &str = "x-credential-id";

/// Credential ID requested via header, if any.
pub fn requested_credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CREDENTIAL_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Resolve the request's credential, refreshing its token when expired.
pub async fn resolve_credential(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<ActiveCredential, AppError> {
    let credential = state
        .session
        .access_token_for(requested_credential(headers))
        .await?;
    Ok(credential.into())
}

/// Middleware that requires a usable credential.
pub async fn require_credential(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let active = resolve_credential(&state, request.headers()).await?;
    tracing::debug!(credential = %active.id, "Credential resolved");
    request.extensions_mut().insert(active);

    Ok(next.run(request).await)
}
