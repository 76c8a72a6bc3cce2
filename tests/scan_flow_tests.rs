// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end segment scan against a mock Strava API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

const ROUTE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

async fn mount(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// One run, then a ride without efforts, then a ride over two segments.
async fn strava() -> MockServer {
    let server = MockServer::start().await;

    mount(
        &server,
        "/athlete/activities",
        200,
        json!([
            {"id": 1, "name": "Run", "type": "Run", "start_date": "2026-10-14T07:00:00Z"},
            {"id": 2, "name": "Trainer", "type": "VirtualRide", "start_date": "2026-10-13T07:00:00Z"},
            {"id": 3, "name": "Hills", "type": "Ride", "start_date": "2026-10-12T07:00:00Z"}
        ]),
    )
    .await;
    mount(&server, "/activities/2", 200, json!({"id": 2, "segment_efforts": []})).await;
    mount(
        &server,
        "/activities/3",
        200,
        json!({
            "id": 3,
            "type": "Ride",
            "segment_efforts": [
                {"id": 301, "name": "Alpine", "elapsed_time": 600, "moving_time": 590,
                 "segment": {"id": 10, "name": "Alpine Road", "distance": 3000.0, "average_grade": 5.0,
                             "map": {"polyline": ROUTE}}},
                {"id": 302, "name": "Bump", "elapsed_time": 90, "moving_time": 90,
                 "segment": {"id": 20, "name": "bump", "distance": 400.0, "average_grade": 3.0}}
            ]
        }),
    )
    .await;
    mount(
        &server,
        "/segments/20",
        200,
        json!({"id": 20, "name": "bump", "elevation_high": 60.0, "elevation_low": 48.0,
               "map": {"polyline": ROUTE}}),
    )
    .await;
    mount(
        &server,
        "/segments/10/leaderboard",
        200,
        json!({"effort_count": 950, "entries": [{"rank": 1, "athlete_name": "K.", "elapsed_time": 420}]}),
    )
    .await;
    mount(
        &server,
        "/segments/20/leaderboard",
        403,
        json!({"message": "Forbidden"}),
    )
    .await;

    server
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_scan_finds_first_ride_with_efforts() {
    let server = strava().await;
    let (app, state) = common::create_test_app(&server.uri());
    state
        .store
        .upsert(common::credential("1", "tok-1"))
        .await
        .unwrap();

    let response = app.clone().oneshot(request("POST", "/api/scan")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = common::json_body(response).await;

    assert_eq!(view["source_activity"], 3);
    assert_eq!(view["diagnostics"]["attempted_ids"], json!([2, 3]));
    assert_eq!(view["diagnostics"]["message"], "Segments loaded.");

    // Default ordering: elapsed time, slowest first
    let rows = view["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["segment"]["id"], 10);
    assert_eq!(rows[0]["kom_time"], 420);
    assert_eq!(rows[0]["effort_count"], 950);
    assert_eq!(rows[1]["segment"]["id"], 20);
    assert_eq!(rows[1]["leaderboard_forbidden"], true);
    assert_eq!(rows[1]["elevation_gain"], 12.0);

    assert_eq!(view["geometries"].as_array().unwrap().len(), 2);
    assert_eq!(view["polyline_stats"], json!({"unique": 2, "decoded": 2}));
    assert!(view["centre"].is_array());

    // Background occurrence count
    let mut counts = Value::Null;
    for _ in 0..50 {
        let response = app
            .clone()
            .oneshot(request("GET", "/api/scan/counts"))
            .await
            .unwrap();
        counts = common::json_body(response).await;
        if counts["ready"] == true {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(counts["ready"], true);
    assert_eq!(counts["counts"]["10"], 1);
    assert_eq!(counts["counts"]["20"], 1);

    // Sorting by name ascends, case-insensitively
    let response = app
        .oneshot(request("GET", "/api/scan?sort=name"))
        .await
        .unwrap();
    let view = common::json_body(response).await;
    assert_eq!(view["sort"], json!({"field": "name", "direction": "asc"}));
    assert_eq!(view["rows"][0]["segment"]["id"], 10);
    assert_eq!(view["rows"][1]["segment"]["id"], 20);
}

#[tokio::test]
async fn test_scan_without_efforts_reports_diagnostics() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/athlete/activities",
        200,
        json!([{"id": 5, "name": "Ride", "type": "Ride", "start_date": "2026-10-14T07:00:00Z"}]),
    )
    .await;
    mount(&server, "/activities/5", 200, json!({"id": 5, "segment_efforts": []})).await;

    let (app, state) = common::create_test_app(&server.uri());
    state
        .store
        .upsert(common::credential("1", "tok-1"))
        .await
        .unwrap();

    let response = app.oneshot(request("POST", "/api/scan")).await.unwrap();
    let view = common::json_body(response).await;

    assert!(view["rows"].as_array().unwrap().is_empty());
    assert_eq!(view["source_activity"], Value::Null);
    assert_eq!(view["diagnostics"]["attempted_ids"], json!([5]));
    assert_eq!(
        view["diagnostics"]["message"],
        "No segment efforts returned for tested recent rides."
    );
}

#[tokio::test]
async fn test_sort_before_scan_is_not_found() {
    let (app, state) = common::create_test_app("http://127.0.0.1:9");
    state
        .store
        .upsert(common::credential("1", "tok-1"))
        .await
        .unwrap();

    let response = app.oneshot(request("GET", "/api/scan")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
