// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava client error classification against a mock upstream.

use segment_scout::error::AppError;
use segment_scout::services::StravaClient;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

async fn client() -> (MockServer, StravaClient) {
    let server = MockServer::start().await;
    let client = StravaClient::new(&common::test_config(&server.uri()));
    (server, client)
}

#[tokio::test]
async fn test_list_activities_sends_bearer_and_page_size() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .and(header("authorization", "Bearer tok"))
        .and(query_param("per_page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Morning Ride", "type": "Ride", "start_date": "2026-10-12T07:00:00Z"},
            {"id": 2, "name": "Jog", "type": "Run", "start_date": "2026-10-11T07:00:00Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let activities = client.list_activities("tok", 3).await.unwrap();
    assert_eq!(activities.len(), 2);
    assert!(activities[0].is_ride());
    assert!(!activities[1].is_ride());
}

#[tokio::test]
async fn test_list_activities_error_object() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Authorization Error"})),
        )
        .mount(&server)
        .await;

    let err = client.list_activities("tok", 3).await.unwrap_err();
    match err {
        AppError::UnexpectedResponse(msg) => {
            assert_eq!(msg, "Strava API error: Authorization Error")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_activities_non_array_without_message() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"foo": 1})))
        .mount(&server)
        .await;

    let err = client.list_activities("tok", 3).await.unwrap_err();
    assert!(
        matches!(err, AppError::UnexpectedResponse(ref m) if m.contains("not an array")),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_rate_limit_is_classified() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/segments/5"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client.get_segment("tok", 5).await.unwrap_err();
    assert!(matches!(err, AppError::RateLimited));
}

#[tokio::test]
async fn test_unauthorized_is_token_error() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/activities/9"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Authorization Error"})),
        )
        .mount(&server)
        .await;

    let err = client.get_activity_detail("tok", 9).await.unwrap_err();
    assert!(err.is_token_error());
}

#[tokio::test]
async fn test_other_status_carries_message() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/segments/5"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Record Not Found"})))
        .mount(&server)
        .await;

    match client.get_segment("tok", 5).await.unwrap_err() {
        AppError::StravaApi { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Record Not Found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_leaderboard_forbidden_is_distinct() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/segments/5/leaderboard"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Forbidden"})))
        .mount(&server)
        .await;

    let err = client.get_leaderboard("tok", 5).await.unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_leaderboard_parsed() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/segments/5/leaderboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "effort_count": 412,
            "entries": [
                {"rank": 1, "athlete_name": "Fast F.", "elapsed_time": 301},
                {"rank": 2, "athlete_name": "Quick Q.", "elapsed_time": 309}
            ]
        })))
        .mount(&server)
        .await;

    let board = client.get_leaderboard("tok", 5).await.unwrap();
    assert_eq!(board.effort_count, 412);
    assert_eq!(board.kom_time, Some(301));
    assert_eq!(board.entries.len(), 2);
}

#[tokio::test]
async fn test_malformed_json_is_unexpected() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/segments/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.get_segment("tok", 5).await.unwrap_err();
    assert!(matches!(err, AppError::UnexpectedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_upstream_is_transport() {
    let client = StravaClient::new(&common::test_config("http://127.0.0.1:9"));
    let err = client.get_segment("tok", 5).await.unwrap_err();
    assert!(matches!(err, AppError::Transport(_)));
}

#[tokio::test]
async fn test_effort_pages() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/segments/5/all_efforts"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 10, "elapsed_time": 300},
            {"id": 11, "elapsed_time": 290}
        ])))
        .mount(&server)
        .await;

    let page = client.list_segment_efforts("tok", 5, 2, 200).await.unwrap();
    assert_eq!(page.len(), 2);
}
