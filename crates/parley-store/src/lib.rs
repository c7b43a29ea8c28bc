//! Parley forum — PostgreSQL persistence.
//!
//! [`PgAggregateStore`](pg_aggregate_store::PgAggregateStore) commits an
//! aggregate's state and its outbox records in one transaction.
//! [`PgOutboxStore`](pg_outbox_store::PgOutboxStore) hands out
//! transaction-scoped claims over pending outbox rows using
//! `FOR UPDATE SKIP LOCKED`, so competing relays never share a record.

use sqlx::migrate::Migrator;

pub mod pg_aggregate_store;
pub mod pg_outbox_store;

mod sqlx_error;

/// Embedded schema migrations (`migrations/` at the workspace root).
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
