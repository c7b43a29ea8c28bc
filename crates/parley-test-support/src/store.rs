//! In-memory `AggregateStore` / `OutboxStore` with emulated row locks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::DomainError;
use parley_core::outbox::{OutboxClaim, OutboxRecord, OutboxStatus, OutboxStore};
use parley_core::repository::{
    AggregateRecord, AggregateStore, AggregateWrite, UnitOfWork, merge_state,
};
use uuid::Uuid;

/// Where an injected storage failure strikes inside `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Before the aggregate state is written.
    StateWrite,
    /// After the state write, before any outbox insert.
    OutboxWrite,
    /// After both writes, at commit.
    Commit,
}

#[derive(Debug, Default)]
struct Tables {
    aggregates: HashMap<Uuid, AggregateRecord>,
    outbox: Vec<OutboxRecord>,
    locked: HashSet<Uuid>,
}

/// Transactional in-memory store.
///
/// `commit` stages both writes and publishes them together, so an injected
/// [`FailPoint`] leaves nothing observable. Claims lock their records until
/// released or dropped; other claimants skip locked records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_point: Option<FailPoint>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose every `commit` fails at `point`.
    #[must_use]
    pub fn failing_at(point: FailPoint) -> Self {
        Self {
            tables: Arc::default(),
            fail_point: Some(point),
        }
    }

    /// Returns a handle over the same tables whose `commit` fails at `point`.
    #[must_use]
    pub fn with_fail_point(&self, point: FailPoint) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            fail_point: Some(point),
        }
    }

    /// Seeds an aggregate row directly, bypassing the persister.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_aggregate(&self, record: AggregateRecord) {
        self.tables
            .lock()
            .unwrap()
            .aggregates
            .insert(record.aggregate_id, record);
    }

    /// Seeds an outbox row directly, bypassing the persister.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_outbox_record(&self, record: OutboxRecord) {
        self.tables.lock().unwrap().outbox.push(record);
    }

    /// Returns the committed row for `aggregate_id`, regardless of tenant.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn aggregate(&self, aggregate_id: Uuid) -> Option<AggregateRecord> {
        self.tables
            .lock()
            .unwrap()
            .aggregates
            .get(&aggregate_id)
            .cloned()
    }

    /// Returns a snapshot of every committed outbox record in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.tables.lock().unwrap().outbox.clone()
    }

    fn check(&self, point: FailPoint) -> Result<(), DomainError> {
        if self.fail_point == Some(point) {
            return Err(DomainError::Infrastructure(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

fn stage_state_write(
    aggregates: &HashMap<Uuid, AggregateRecord>,
    write: AggregateWrite,
) -> Result<AggregateRecord, DomainError> {
    let existing = aggregates.get(&write.aggregate_id);

    if write.is_insert() {
        if let Some(found) = existing {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: write.aggregate_id,
                expected: 0,
                actual: found.version,
            });
        }
        return Ok(AggregateRecord {
            aggregate_id: write.aggregate_id,
            tenant_id: write.tenant_id,
            aggregate_type: write.aggregate_type,
            state: write.state,
            version: 1,
            created_at: write.written_at,
            updated_at: write.written_at,
        });
    }

    let found = existing
        .filter(|r| r.tenant_id == write.tenant_id && r.aggregate_type == write.aggregate_type)
        .ok_or(DomainError::AggregateNotFound(write.aggregate_id))?;
    if found.version != write.expected_version {
        return Err(DomainError::ConcurrencyConflict {
            aggregate_id: write.aggregate_id,
            expected: write.expected_version,
            actual: found.version,
        });
    }

    let mut updated = found.clone();
    updated.version = write.next_version();
    updated.updated_at = write.written_at;
    merge_state(&mut updated.state, write.state);
    Ok(updated)
}

#[async_trait]
impl AggregateStore for InMemoryStore {
    async fn load(
        &self,
        tenant_id: Uuid,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .aggregates
            .get(&aggregate_id)
            .filter(|r| r.tenant_id == tenant_id && r.aggregate_type == aggregate_type)
            .cloned())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();

        self.check(FailPoint::StateWrite)?;
        let staged_state = stage_state_write(&tables.aggregates, unit.state)?;

        self.check(FailPoint::OutboxWrite)?;
        let mut staged_outbox: Vec<OutboxRecord> = Vec::with_capacity(unit.outbox.len());
        for record in unit.outbox {
            let duplicate = tables
                .outbox
                .iter()
                .chain(staged_outbox.iter())
                .any(|r| r.record_id == record.record_id);
            if duplicate {
                return Err(DomainError::Infrastructure(format!(
                    "duplicate outbox record id {}",
                    record.record_id
                )));
            }
            staged_outbox.push(record);
        }

        self.check(FailPoint::Commit)?;
        tables
            .aggregates
            .insert(staged_state.aggregate_id, staged_state);
        tables.outbox.extend(staged_outbox);
        Ok(())
    }
}

/// Claim over in-memory outbox rows.
#[derive(Debug)]
struct InMemoryClaim {
    tables: Arc<Mutex<Tables>>,
    records: Vec<OutboxRecord>,
    acknowledged: Vec<(Uuid, DateTime<Utc>)>,
    deferred: Vec<(Uuid, DateTime<Utc>)>,
    released: bool,
}

impl InMemoryClaim {
    fn unlock(&self, tables: &mut Tables) {
        for record in &self.records {
            tables.locked.remove(&record.record_id);
        }
    }
}

#[async_trait]
impl OutboxClaim for InMemoryClaim {
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
        self.acknowledged.push((record_id, processed_at));
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
        self.deferred.push((record_id, retry_after));
        Ok(())
    }

    async fn release(mut self: Box<Self>) -> Result<(), DomainError> {
        let tables = Arc::clone(&self.tables);
        let mut tables = tables.lock().unwrap();
        for (record_id, processed_at) in &self.acknowledged {
            if let Some(row) = tables.outbox.iter_mut().find(|r| r.record_id == *record_id) {
                row.status = OutboxStatus::Processed;
                row.processed_at = Some(*processed_at);
            }
        }
        for (record_id, retry_after) in &self.deferred {
            if let Some(row) = tables
                .outbox
                .iter_mut()
                .find(|r| r.record_id == *record_id && r.status == OutboxStatus::Pending)
            {
                row.retry_after = Some(*retry_after);
            }
        }
        self.unlock(&mut tables);
        self.released = true;
        Ok(())
    }
}

impl Drop for InMemoryClaim {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(mut tables) = self.tables.lock() {
            self.unlock(&mut tables);
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn claim_batch(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Box<dyn OutboxClaim>, DomainError> {
        let mut tables = self.tables.lock().unwrap();

        let held_back: HashSet<Uuid> = tables
            .outbox
            .iter()
            .filter(|r| {
                r.status == OutboxStatus::Pending && r.retry_after.is_some_and(|t| t > now)
            })
            .map(|r| r.aggregate_id)
            .collect();
        let mut candidates: Vec<&OutboxRecord> = tables
            .outbox
            .iter()
            .filter(|r| {
                r.status == OutboxStatus::Pending
                    && !tables.locked.contains(&r.record_id)
                    && !held_back.contains(&r.aggregate_id)
            })
            .collect();
        candidates.sort_by_key(|r| r.created_at);
        let records: Vec<OutboxRecord> = candidates
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect();

        for record in &records {
            tables.locked.insert(record.record_id);
        }

        Ok(Box::new(InMemoryClaim {
            tables: Arc::clone(&self.tables),
            records,
            acknowledged: Vec::new(),
            deferred: Vec::new(),
            released: false,
        }))
    }

    async fn pending_count(&self) -> Result<i64, DomainError> {
        let tables = self.tables.lock().unwrap();
        let pending = tables
            .outbox
            .iter()
            .filter(|r| r.status == OutboxStatus::Pending)
            .count();
        Ok(i64::try_from(pending).unwrap_or(i64::MAX))
    }
}

/// A store that fails every operation with an infrastructure error.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl AggregateStore for FailingStore {
    async fn load(
        &self,
        _tenant_id: Uuid,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
    ) -> Result<Option<AggregateRecord>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn commit(&self, _unit: UnitOfWork) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

#[async_trait]
impl OutboxStore for FailingStore {
    async fn claim_batch(
        &self,
        _limit: u32,
        _now: DateTime<Utc>,
    ) -> Result<Box<dyn OutboxClaim>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn pending_count(&self) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
