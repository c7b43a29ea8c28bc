//! Outbox backlog endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Outbox backlog response.
#[derive(Debug, Serialize)]
pub struct OutboxStats {
    /// Records still `PENDING`.
    pub pending: i64,
}

/// GET /outbox/stats
async fn stats(State(state): State<AppState>) -> Result<Json<OutboxStats>, ApiError> {
    let pending = state.outbox.pending_count().await?;
    Ok(Json(OutboxStats { pending }))
}

/// Returns the outbox router.
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}
