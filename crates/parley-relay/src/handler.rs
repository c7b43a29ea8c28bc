//! Downstream event handlers and their registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::outbox::OutboxRecord;
use tracing::info;

use crate::error::HandlerError;

/// A downstream consumer of outbox records.
///
/// Delivery is at-least-once: a record is redelivered until every handler
/// subscribed to its type succeeds in the same pass, so implementations must
/// be idempotent on `record.record_id`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Processes one record.
    ///
    /// # Errors
    ///
    /// Returns a `HandlerError` to leave the record `PENDING`.
    async fn handle(&self, record: &OutboxRecord) -> Result<(), HandlerError>;
}

/// Routes records to handlers by event type tag.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    by_type: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    wildcard: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to records tagged `event_type`.
    pub fn subscribe(&mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.by_type
            .entry(event_type.into())
            .or_default()
            .push(handler);
    }

    /// Subscribes `handler` to every record.
    pub fn subscribe_all(&mut self, handler: Arc<dyn EventHandler>) {
        self.wildcard.push(handler);
    }

    /// Handlers for `event_type`: type-specific subscribers in registration
    /// order, then wildcard subscribers.
    #[must_use]
    pub fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.by_type
            .get(event_type)
            .into_iter()
            .flatten()
            .chain(self.wildcard.iter())
            .cloned()
            .collect()
    }
}

/// Writes every record to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditLogHandler;

#[async_trait]
impl EventHandler for AuditLogHandler {
    fn name(&self) -> &str {
        "audit_log"
    }

    async fn handle(&self, record: &OutboxRecord) -> Result<(), HandlerError> {
        info!(
            target: "audit",
            record_id = %record.record_id,
            tenant_id = %record.tenant_id,
            aggregate_type = %record.aggregate_type,
            aggregate_id = %record.aggregate_id,
            event_type = %record.event_type,
            correlation_id = %record.correlation_id,
            created_at = %record.created_at,
            "domain event"
        );
        Ok(())
    }
}
