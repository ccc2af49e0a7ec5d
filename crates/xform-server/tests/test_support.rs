//! Shared test support utilities for integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use xform_core::Dispatcher;
use xform_server::api::{create_router, AppState};
use xform_server::Config;

/// Create a router with default configuration
pub fn test_router() -> Router {
    router_with(Config::default())
}

/// Create a router from the given configuration
pub fn router_with(config: Config) -> Router {
    let dispatcher = Dispatcher::new().with_max_depth(config.engine.max_depth);
    create_router(AppState::new(dispatcher), &config).expect("router builds")
}

/// Create a POST request to `/api/evaluate` with a raw body
pub fn evaluate_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/evaluate")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

/// Create a GET request
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Send a request and return status and JSON body
pub async fn send_json(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Send a request and return the raw response
pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

/// POST a JSON value to `/api/evaluate`
pub async fn post_evaluate(body: Value) -> (StatusCode, Value) {
    send_json(test_router(), evaluate_request(body.to_string())).await
}
