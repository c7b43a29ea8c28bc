//! Domain event abstractions.
//!
//! Each bounded context defines a closed enum of event kinds and implements
//! [`EventKind`] on it. The enum is wrapped in a [`DomainEvent`] envelope
//! that carries identity, tenant and timing. Events are only ever built by
//! aggregate mutation methods.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::context::RequestContext;
use crate::error::DomainError;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    /// Unique, time-ordered event identifier. Becomes the outbox record id.
    pub event_id: Uuid,
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: Uuid,
    /// Tenant owning the aggregate.
    pub tenant_id: Uuid,
    /// Correlation ID of the request that produced the event.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// A closed set of event payload variants.
pub trait EventKind: Serialize + Clone + Send + Sync + std::fmt::Debug {
    /// Stable type tag used by consumers for routing.
    ///
    /// Renaming a tag is a breaking change for every downstream consumer.
    fn event_type(&self) -> &'static str;
}

/// Immutable record of one state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent<K> {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: K,
}

impl<K: EventKind> DomainEvent<K> {
    /// Builds an event for `aggregate_id`, stamped from the clock.
    #[must_use]
    pub fn new(
        aggregate_id: Uuid,
        tenant_id: Uuid,
        ctx: &RequestContext,
        clock: &dyn Clock,
        kind: K,
    ) -> Self {
        Self {
            metadata: EventMetadata {
                event_id: Uuid::now_v7(),
                aggregate_id,
                tenant_id,
                correlation_id: ctx.correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        }
    }

    /// Returns the stable type tag of the payload variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    /// Encodes the payload into a transport-neutral JSON document.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload cannot be encoded.
    pub fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(&self.kind).map_err(|e| {
            DomainError::Serialization(format!(
                "failed to encode {} payload: {e}",
                self.event_type()
            ))
        })
    }
}
