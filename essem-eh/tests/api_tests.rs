//! Integration tests for the essem-eh HTTP surface
//!
//! The worker only exposes a health endpoint; these tests drive the router
//! directly without binding a socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot` method

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn health_endpoint_reports_module_and_version() {
    let app = essem_eh::build_router();

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "essem-eh");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = essem_eh::build_router();

    let request = Request::builder()
        .method("GET")
        .uri("/api/anything")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
