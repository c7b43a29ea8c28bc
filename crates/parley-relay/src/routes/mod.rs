//! Operational HTTP routes.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod outbox;

/// Builds the full router over `state`. Shared by the binary and tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/outbox", outbox::router())
        .with_state(state)
}
