// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;
use crate::polyline::PolylineError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No credential selected")]
    NoCredential,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Strava API error (HTTP {status}): {message}")]
    StravaApi { status: u16, message: String },

    #[error("Strava rate limit exceeded")]
    RateLimited,

    #[error("Strava rejected the access token")]
    TokenRejected,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Leaderboard access forbidden: {0}")]
    LeaderboardForbidden(String),

    #[error("Polyline error: {0}")]
    Polyline(#[from] PolylineError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Credential storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Hint shown when a leaderboard is forbidden for the current token.
    pub const REAUTHORIZE_HINT: &'static str =
        "Reconnect the account and grant read_all scope to view leaderboards";

    /// True if the error means the access token is no longer usable.
    pub fn is_token_error(&self) -> bool {
        matches!(self, AppError::TokenRejected)
    }

    /// True if the error is the distinct "leaderboard forbidden" condition.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AppError::LeaderboardForbidden(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NoCredential => (
                StatusCode::UNAUTHORIZED,
                "no_credential",
                Some(self.to_string()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Transport(msg) => {
                tracing::warn!(error = %msg, "Upstream network error");
                (StatusCode::BAD_GATEWAY, "network_error", Some(msg.clone()))
            }
            AppError::StravaApi { message, .. } => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(message.clone()))
            }
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", None),
            AppError::TokenRejected => (StatusCode::UNAUTHORIZED, "token_rejected", None),
            AppError::UnexpectedResponse(msg) => (
                StatusCode::BAD_GATEWAY,
                "unexpected_response",
                Some(msg.clone()),
            ),
            AppError::LeaderboardForbidden(msg) => (
                StatusCode::FORBIDDEN,
                "leaderboard_forbidden",
                Some(format!("{}. {}", msg, Self::REAUTHORIZE_HINT)),
            ),
            AppError::Polyline(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "polyline_error",
                Some(e.to_string()),
            ),
            AppError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled", None),
            AppError::Store(StoreError::UnknownCredential(id)) => (
                StatusCode::NOT_FOUND,
                "not_found",
                Some(format!("Credential {} not found", id)),
            ),
            AppError::Store(e) => {
                tracing::error!(error = %e, "Credential storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
