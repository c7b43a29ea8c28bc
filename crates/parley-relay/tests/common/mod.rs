//! Shared test helpers for relay HTTP tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parley_core::outbox::OutboxStore;
use tower::ServiceExt;

use parley_relay::routes;
use parley_relay::state::AppState;

/// Build the full router over `outbox`. Uses the same route structure as
/// `main.rs`.
pub fn build_test_app(outbox: Arc<dyn OutboxStore>) -> Router {
    routes::router(AppState::new(outbox))
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
