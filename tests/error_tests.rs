// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use segment_scout::db::StoreError;
use segment_scout::error::AppError;

mod common;

#[test]
fn test_is_token_error_matches() {
    assert!(AppError::TokenRejected.is_token_error());
}

#[test]
fn test_is_token_error_no_match() {
    assert!(!AppError::RateLimited.is_token_error());
    assert!(!AppError::BadRequest("Bad Request".to_string()).is_token_error());
    assert!(!AppError::StravaApi {
        status: 500,
        message: "Internal Server Error".to_string(),
    }
    .is_token_error());
}

#[test]
fn test_forbidden_is_distinct() {
    assert!(AppError::LeaderboardForbidden("Segment 1".to_string()).is_forbidden());
    assert!(!AppError::StravaApi {
        status: 403,
        message: "Forbidden".to_string(),
    }
    .is_forbidden());
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::NoCredential, StatusCode::UNAUTHORIZED, "no_credential"),
        (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        (AppError::TokenRejected, StatusCode::UNAUTHORIZED, "token_rejected"),
        (
            AppError::LeaderboardForbidden("Segment 7".to_string()),
            StatusCode::FORBIDDEN,
            "leaderboard_forbidden",
        ),
        (
            AppError::Store(StoreError::UnknownCredential("x".to_string())),
            StatusCode::NOT_FOUND,
            "not_found",
        ),
    ];

    for (err, status, code) in cases {
        let response = err.into_response();
        assert_eq!(response.status(), status);
        let body = common::json_body(response).await;
        assert_eq!(body["error"], code);
    }
}

#[tokio::test]
async fn test_forbidden_response_carries_reauthorize_hint() {
    let response = AppError::LeaderboardForbidden("Segment 7".to_string()).into_response();
    let body = common::json_body(response).await;
    let details = body["details"].as_str().unwrap();
    assert!(details.contains(AppError::REAUTHORIZE_HINT));
}

#[tokio::test]
async fn test_internal_error_hides_details() {
    let response = AppError::Internal(anyhow::anyhow!("secret path /etc")).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::json_body(response).await;
    assert!(body.get("details").is_none());
}
