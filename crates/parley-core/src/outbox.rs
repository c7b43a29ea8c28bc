//! Outbox records and the competing-consumer claim contract.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Processing status of an outbox record. `Pending` moves to `Processed`
/// exactly once; there are no other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboxStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Dispatched and acknowledged.
    Processed,
}

impl OutboxStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OutboxStatus::Pending),
            "PROCESSED" => Ok(OutboxStatus::Processed),
            other => Err(DomainError::Serialization(format!(
                "unknown outbox status {other:?}"
            ))),
        }
    }
}

/// Durable record of one domain event awaiting relay.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    /// Record identifier; equal to the event id.
    pub record_id: Uuid,
    /// Tenant owning the aggregate.
    pub tenant_id: Uuid,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// Aggregate/stream the event belongs to.
    pub aggregate_id: Uuid,
    /// Stable event type tag.
    pub event_type: String,
    /// Self-contained JSON payload.
    pub payload: serde_json::Value,
    /// Correlation ID of the originating request.
    pub correlation_id: Uuid,
    /// Event creation time; claim order.
    pub created_at: DateTime<Utc>,
    /// Processing status.
    pub status: OutboxStatus,
    /// When the record was acknowledged.
    pub processed_at: Option<DateTime<Utc>>,
    /// Set after a failed dispatch. Until then no record of the same
    /// aggregate is claimable.
    pub retry_after: Option<DateTime<Utc>>,
}

/// A batch of records claimed by one relay.
///
/// The claim holds row-level exclusivity until it is released. Dropping a
/// claim without releasing it discards its acknowledgements and frees the
/// records for other relays.
#[async_trait]
pub trait OutboxClaim: Send {
    /// Claimed records, oldest first.
    fn records(&self) -> &[OutboxRecord];

    /// Marks a claimed record `PROCESSED` once the claim is released.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `record_id` is not part of this
    /// claim, or `DomainError::Infrastructure` on storage failure.
    async fn mark_processed(
        &mut self,
        record_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Holds a claimed record, and with it every `PENDING` record of its
    /// aggregate, back from claims made before `retry_after`. Takes effect
    /// once the claim is released.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `record_id` is not part of this
    /// claim, or `DomainError::Infrastructure` on storage failure.
    async fn defer(
        &mut self,
        record_id: Uuid,
        retry_after: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Commits acknowledgements and deferrals and frees the claimed records.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure, in which
    /// case every record of the claim stays `PENDING`.
    async fn release(self: Box<Self>) -> Result<(), DomainError>;
}

/// Reader side of the outbox, shared by competing relays.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Claims up to `limit` `PENDING` records ordered by creation time,
    /// skipping records held by another in-flight claim and records of any
    /// aggregate with a deferral still in force at `now`. Concurrent callers
    /// never receive overlapping records.
    async fn claim_batch(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Box<dyn OutboxClaim>, DomainError>;

    /// Number of records still `PENDING`.
    async fn pending_count(&self) -> Result<i64, DomainError>;
}
