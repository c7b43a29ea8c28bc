//! `PostgreSQL` implementation of the `AggregateStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use parley_core::error::DomainError;
use parley_core::outbox::OutboxRecord;
use parley_core::repository::{AggregateRecord, AggregateStore, AggregateWrite, UnitOfWork};

use crate::sqlx_error::{is_unique_violation, map_sqlx_error};

#[derive(Debug, FromRow)]
struct AggregateRow {
    aggregate_id: Uuid,
    tenant_id: Uuid,
    aggregate_type: String,
    state: serde_json::Value,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AggregateRow> for AggregateRecord {
    fn from(row: AggregateRow) -> Self {
        Self {
            aggregate_id: row.aggregate_id,
            tenant_id: row.tenant_id,
            aggregate_type: row.aggregate_type,
            state: row.state,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed aggregate store.
///
/// Each `commit` runs in its own transaction: the state insert or update and
/// every outbox insert either all land or none do.
#[derive(Debug, Clone)]
pub struct PgAggregateStore {
    pool: PgPool,
}

impl PgAggregateStore {
    /// Creates a new `PgAggregateStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn current_version(
    tx: &mut Transaction<'static, Postgres>,
    write: &AggregateWrite,
) -> Result<Option<i64>, DomainError> {
    sqlx::query_scalar(
        r"
        SELECT version FROM aggregates
        WHERE aggregate_id = $1 AND tenant_id = $2 AND aggregate_type = $3
        ",
    )
    .bind(write.aggregate_id)
    .bind(write.tenant_id)
    .bind(&write.aggregate_type)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("current_version", e))
}

async fn insert_state(
    tx: &mut Transaction<'static, Postgres>,
    write: &AggregateWrite,
) -> Result<(), DomainError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r"
        INSERT INTO aggregates (
            aggregate_id, tenant_id, aggregate_type, state, version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, 1, $5, $5)
        ON CONFLICT (aggregate_id) DO NOTHING
        RETURNING version
        ",
    )
    .bind(write.aggregate_id)
    .bind(write.tenant_id)
    .bind(&write.aggregate_type)
    .bind(&write.state)
    .bind(write.written_at)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_state", e))?;

    if inserted.is_some() {
        return Ok(());
    }
    let actual = current_version(tx, write).await?.unwrap_or_default();
    Err(DomainError::ConcurrencyConflict {
        aggregate_id: write.aggregate_id,
        expected: 0,
        actual,
    })
}

async fn update_state(
    tx: &mut Transaction<'static, Postgres>,
    write: &AggregateWrite,
) -> Result<(), DomainError> {
    // `||` keeps stored keys the snapshot does not carry.
    let updated: Option<i64> = sqlx::query_scalar(
        r"
        UPDATE aggregates
        SET state = state || $4, version = version + 1, updated_at = $5
        WHERE aggregate_id = $1 AND tenant_id = $2 AND aggregate_type = $3
          AND version = $6
        RETURNING version
        ",
    )
    .bind(write.aggregate_id)
    .bind(write.tenant_id)
    .bind(&write.aggregate_type)
    .bind(&write.state)
    .bind(write.written_at)
    .bind(write.expected_version)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_state", e))?;

    if updated.is_some() {
        return Ok(());
    }
    match current_version(tx, write).await? {
        None => Err(DomainError::AggregateNotFound(write.aggregate_id)),
        Some(actual) => Err(DomainError::ConcurrencyConflict {
            aggregate_id: write.aggregate_id,
            expected: write.expected_version,
            actual,
        }),
    }
}

async fn insert_outbox_record(
    tx: &mut Transaction<'static, Postgres>,
    record: &OutboxRecord,
) -> Result<(), DomainError> {
    sqlx::query(
        r"
        INSERT INTO outbox_events (
            record_id, tenant_id, aggregate_type, aggregate_id, event_type,
            payload, correlation_id, created_at, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(record.record_id)
    .bind(record.tenant_id)
    .bind(&record.aggregate_type)
    .bind(record.aggregate_id)
    .bind(&record.event_type)
    .bind(&record.payload)
    .bind(record.correlation_id)
    .bind(record.created_at)
    .bind(record.status.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DomainError::Infrastructure(format!(
                "duplicate outbox record id {}",
                record.record_id
            ))
        } else {
            map_sqlx_error("insert_outbox_record", e)
        }
    })?;
    Ok(())
}

#[async_trait]
impl AggregateStore for PgAggregateStore {
    #[instrument(skip(self), err)]
    async fn load(
        &self,
        tenant_id: Uuid,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError> {
        let row: Option<AggregateRow> = sqlx::query_as(
            r"
            SELECT aggregate_id, tenant_id, aggregate_type, state, version, created_at, updated_at
            FROM aggregates
            WHERE aggregate_id = $1 AND tenant_id = $2 AND aggregate_type = $3
            ",
        )
        .bind(aggregate_id)
        .bind(tenant_id)
        .bind(aggregate_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load", e))?;

        Ok(row.map(AggregateRecord::from))
    }

    #[instrument(
        skip_all,
        fields(
            aggregate_id = %unit.state.aggregate_id,
            aggregate_type = %unit.state.aggregate_type,
            expected_version = unit.state.expected_version,
            outbox_records = unit.outbox.len()
        ),
        err
    )]
    async fn commit(&self, unit: UnitOfWork) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Any early return drops `tx`, which rolls back.
        if unit.state.is_insert() {
            insert_state(&mut tx, &unit.state).await?;
        } else {
            update_state(&mut tx, &unit.state).await?;
        }
        for record in &unit.outbox {
            insert_outbox_record(&mut tx, record).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!(version = unit.state.next_version(), "unit of work committed");
        Ok(())
    }
}
