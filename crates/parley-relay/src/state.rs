//! Shared application state.

use std::sync::Arc;

use parley_core::outbox::OutboxStore;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Outbox reader backing the stats endpoint.
    pub outbox: Arc<dyn OutboxStore>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(outbox: Arc<dyn OutboxStore>) -> Self {
        Self { outbox }
    }
}
