//! Integration tests for the health endpoint.

mod common;

use axum::http::{Method, StatusCode};

use common::spawn_test_app;

#[tokio::test]
async fn health_reports_ok_with_no_active_jobs() {
    let app = spawn_test_app();

    let (status, body) = app.request(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_jobs"], 0);
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn health_responses_carry_a_request_id() {
    let app = spawn_test_app();

    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(axum::body::Body::empty())
        .expect("build request");

    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("x-request-id"),
        "middleware must attach a request id"
    );
}
