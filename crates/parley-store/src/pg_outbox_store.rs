//! `PostgreSQL` implementation of the `OutboxStore` trait.
//!
//! A claim is an open transaction holding row locks taken with
//! `FOR UPDATE SKIP LOCKED`. Concurrent claimants skip those rows instead of
//! waiting on them. Releasing the claim commits the `PROCESSED` updates;
//! dropping it rolls back, leaving every row `PENDING` and reclaimable.
//!
//! A deferred row (`retry_after` in the future) keeps every pending row of
//! its aggregate out of claims until the deferral lapses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use parley_core::error::DomainError;
use parley_core::outbox::{OutboxClaim, OutboxRecord, OutboxStatus, OutboxStore};

use crate::sqlx_error::map_sqlx_error;

#[derive(Debug, FromRow)]
struct OutboxRow {
    record_id: Uuid,
    tenant_id: Uuid,
    aggregate_type: String,
    aggregate_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    correlation_id: Uuid,
    created_at: DateTime<Utc>,
    status: String,
    processed_at: Option<DateTime<Utc>>,
    retry_after: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for OutboxRecord {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(Self {
            record_id: row.record_id,
            tenant_id: row.tenant_id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            correlation_id: row.correlation_id,
            created_at: row.created_at,
            status: row.status.parse::<OutboxStatus>()?,
            processed_at: row.processed_at,
            retry_after: row.retry_after,
        })
    }
}

/// PostgreSQL-backed outbox reader.
#[derive(Debug, Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    /// Creates a new `PgOutboxStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A batch of locked outbox rows and the transaction holding the locks.
struct PgClaim {
    tx: Transaction<'static, Postgres>,
    records: Vec<OutboxRecord>,
}

#[async_trait]
impl OutboxClaim for PgClaim {
    fn records(&self) -> &[OutboxRecord] {
        &self.records
    }

    async fn mark_processed(
        &mut self,
        record_id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.records.iter().any(|r| r.record_id == record_id) {
            return Err(DomainError::Validation(format!(
                "outbox record {record_id} is not part of this claim"
            )));
        }

        sqlx::query(
            r"
            UPDATE outbox_events
            SET status = $2, processed_at = $3
            WHERE record_id = $1 AND status = $4
            ",
        )
        .bind(record_id)
        .bind(OutboxStatus::Processed.as_str())
        .bind(processed_at)
        .bind(OutboxStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("mark_processed", e))?;
        Ok(())
    }

    async fn defer(
        &mut self,
        record_id: Uuid,
        retry_after: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.records.iter().any(|r| r.record_id == record_id) {
            return Err(DomainError::Validation(format!(
                "outbox record {record_id} is not part of this claim"
            )));
        }

        sqlx::query(
            r"
            UPDATE outbox_events
            SET retry_after = $2
            WHERE record_id = $1 AND status = $3
            ",
        )
        .bind(record_id)
        .bind(retry_after)
        .bind(OutboxStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("defer", e))?;
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("release_claim", e))
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    #[instrument(skip(self), err)]
    async fn claim_batch(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Box<dyn OutboxClaim>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let rows: Vec<OutboxRow> = sqlx::query_as(
            r"
            SELECT record_id, tenant_id, aggregate_type, aggregate_id, event_type,
                   payload, correlation_id, created_at, status, processed_at,
                   retry_after
            FROM outbox_events o
            WHERE o.status = $1
              AND NOT EXISTS (
                  SELECT 1 FROM outbox_events d
                  WHERE d.aggregate_id = o.aggregate_id
                    AND d.status = $1
                    AND d.retry_after > $3
              )
            ORDER BY o.created_at, o.position
            LIMIT $2
            FOR UPDATE OF o SKIP LOCKED
            ",
        )
        .bind(OutboxStatus::Pending.as_str())
        .bind(i64::from(limit))
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_batch", e))?;

        let records = rows
            .into_iter()
            .map(OutboxRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(claimed = records.len(), "outbox batch claimed");

        Ok(Box::new(PgClaim { tx, records }))
    }

    #[instrument(skip(self), err)]
    async fn pending_count(&self) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_events WHERE status = $1")
            .bind(OutboxStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("pending_count", e))
    }
}
