//! Integration tests for the outbox stats endpoint.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use parley_core::context::RequestContext;
use parley_discussion::application::command_handlers::{handle_create_post, handle_create_thread};
use parley_discussion::domain::commands::{CreatePost, CreateThread};
use parley_relay::handler::HandlerRegistry;
use parley_relay::relay::OutboxRelay;
use parley_test_support::{FailingStore, FixedClock, InMemoryStore};
use uuid::Uuid;

#[tokio::test]
async fn test_stats_reports_pending_backlog_until_relayed() {
    // Arrange
    let store = InMemoryStore::new();
    let clock = FixedClock::default_instant();
    let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
    let thread_id = Uuid::new_v4();
    handle_create_thread(
        &CreateThread {
            thread_id,
            category_id: Uuid::new_v4(),
            title: "Release notes".to_string(),
        },
        &ctx,
        &clock,
        &store,
    )
    .await
    .unwrap();
    handle_create_post(
        &CreatePost {
            post_id: Uuid::new_v4(),
            thread_id,
            content: "v0.1 is out".to_string(),
        },
        &ctx,
        &clock,
        &store,
    )
    .await
    .unwrap();

    // Act
    let (before_status, before) =
        common::get_json(common::build_test_app(Arc::new(store.clone())), "/outbox/stats").await;
    OutboxRelay::new(
        Arc::new(store.clone()),
        HandlerRegistry::new(),
        Arc::new(clock),
    )
    .run_once()
    .await
    .unwrap();
    let (_, after) =
        common::get_json(common::build_test_app(Arc::new(store)), "/outbox/stats").await;

    // Assert
    assert_eq!(before_status, StatusCode::OK);
    assert_eq!(before["pending"], 2);
    assert_eq!(after["pending"], 0);
}

#[tokio::test]
async fn test_stats_storage_failure_returns_500() {
    let app = common::build_test_app(Arc::new(FailingStore));

    let (status, json) = common::get_json(app, "/outbox/stats").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "infrastructure_error");
}
