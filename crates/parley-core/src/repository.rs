//! Aggregate storage abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::outbox::OutboxRecord;

/// Persisted representation of an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    /// Aggregate identifier.
    pub aggregate_id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// State snapshot (always a JSON object).
    pub state: serde_json::Value,
    /// Number of committed saves.
    pub version: i64,
    /// When the aggregate was first saved.
    pub created_at: DateTime<Utc>,
    /// When the aggregate was last saved.
    pub updated_at: DateTime<Utc>,
}

/// The state half of a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateWrite {
    /// Aggregate identifier.
    pub aggregate_id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// State snapshot to merge over the stored one.
    pub state: serde_json::Value,
    /// Version the writer loaded; `0` means insert.
    pub expected_version: i64,
    /// Timestamp of the write.
    pub written_at: DateTime<Utc>,
}

impl AggregateWrite {
    /// True when the aggregate has never been saved.
    #[must_use]
    pub fn is_insert(&self) -> bool {
        self.expected_version == 0
    }

    /// Version the aggregate holds once this write commits.
    #[must_use]
    pub fn next_version(&self) -> i64 {
        self.expected_version + 1
    }
}

/// Everything one `save` must make durable, all or nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOfWork {
    /// Aggregate state write.
    pub state: AggregateWrite,
    /// Outbox records for the drained journal, in program order.
    pub outbox: Vec<OutboxRecord>,
}

/// Storage for aggregate state and its outbox.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Loads an aggregate owned by `tenant_id`. Aggregates of other tenants
    /// are reported as absent.
    async fn load(
        &self,
        tenant_id: Uuid,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError>;

    /// Applies the state write and inserts every outbox record in one
    /// atomic transaction.
    ///
    /// Inserts fail with `ConcurrencyConflict` if the aggregate already
    /// exists; updates fail with `ConcurrencyConflict` if the stored version
    /// differs from `expected_version`, and with `AggregateNotFound` if the
    /// row is gone. Updates merge the snapshot's top-level keys over the
    /// stored state, so keys the snapshot omits are kept.
    async fn commit(&self, unit: UnitOfWork) -> Result<(), DomainError>;
}

/// Merges `incoming` over `stored` key by key, the way `jsonb || jsonb`
/// does for two objects. Non-object values are replaced outright.
pub fn merge_state(stored: &mut serde_json::Value, incoming: serde_json::Value) {
    match (stored.as_object_mut(), incoming) {
        (Some(existing), serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (_, other) => *stored = other,
    }
}
