//! Unit-of-work persister.
//!
//! [`save`] turns a mutated aggregate into one [`UnitOfWork`]: the state
//! snapshot plus one outbox record per drained event. The store commits
//! both halves in a single transaction, so a state change is durable if and
//! only if its outbox records are.

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::{DomainEvent, EventKind};
use crate::outbox::{OutboxRecord, OutboxStatus};
use crate::repository::{AggregateStore, AggregateWrite, UnitOfWork};

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// The saved aggregate.
    pub aggregate_id: Uuid,
    /// Version now persisted.
    pub version: i64,
    /// Outbox records written, in program order.
    pub outbox_record_ids: Vec<Uuid>,
}

/// Loads an aggregate of type `A` owned by `tenant_id`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no such aggregate exists for
/// the tenant, `DomainError::Serialization` if its state is unreadable, or
/// the store's error unchanged.
#[instrument(skip(store), fields(aggregate_type = A::AGGREGATE_TYPE), err)]
pub async fn load<A: AggregateRoot>(
    store: &dyn AggregateStore,
    tenant_id: Uuid,
    aggregate_id: Uuid,
) -> Result<A, DomainError> {
    let record = store
        .load(tenant_id, A::AGGREGATE_TYPE, aggregate_id)
        .await?
        .ok_or(DomainError::AggregateNotFound(aggregate_id))?;
    A::restore(record)
}

/// Persists the aggregate's state and drains its journal into the outbox.
///
/// Saving an already persisted aggregate with an empty journal writes
/// nothing. On any error nothing is written and the drained events go back
/// into the journal, so the same instance can be saved again.
///
/// # Errors
///
/// Returns `DomainError::InvalidState` for a never-saved aggregate with an
/// empty journal, `DomainError::Serialization` if the state or an event
/// payload cannot be encoded, and the store's error unchanged otherwise.
#[instrument(
    skip_all,
    fields(aggregate_type = A::AGGREGATE_TYPE, aggregate_id = %aggregate.aggregate_id()),
    err
)]
pub async fn save<A: AggregateRoot>(
    aggregate: &mut A,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let expected_version = aggregate.version();
    let events = aggregate.drain_events();

    if events.is_empty() {
        if expected_version == 0 {
            return Err(DomainError::InvalidState(format!(
                "{} {} has no recorded events to persist",
                A::AGGREGATE_TYPE,
                aggregate.aggregate_id()
            )));
        }
        debug!(version = expected_version, "journal empty, nothing to persist");
        return Ok(SaveReceipt {
            aggregate_id: aggregate.aggregate_id(),
            version: expected_version,
            outbox_record_ids: Vec::new(),
        });
    }

    let committed = commit_unit(&*aggregate, &events, expected_version, clock, store).await;
    match committed {
        Ok(receipt) => {
            aggregate.mark_saved(receipt.version);
            debug!(
                version = receipt.version,
                events = receipt.outbox_record_ids.len(),
                "unit of work committed"
            );
            Ok(receipt)
        }
        Err(e) => {
            aggregate.requeue_events(events);
            Err(e)
        }
    }
}

async fn commit_unit<A: AggregateRoot>(
    aggregate: &A,
    events: &[DomainEvent<A::Kind>],
    expected_version: i64,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let state = AggregateWrite {
        aggregate_id: aggregate.aggregate_id(),
        tenant_id: aggregate.tenant_id(),
        aggregate_type: A::AGGREGATE_TYPE.to_owned(),
        state: aggregate.snapshot()?,
        expected_version,
        written_at: clock.now(),
    };

    let outbox = events
        .iter()
        .map(|event| to_outbox_record(A::AGGREGATE_TYPE, event))
        .collect::<Result<Vec<_>, _>>()?;

    let receipt = SaveReceipt {
        aggregate_id: state.aggregate_id,
        version: state.next_version(),
        outbox_record_ids: outbox.iter().map(|r| r.record_id).collect(),
    };

    store.commit(UnitOfWork { state, outbox }).await?;
    Ok(receipt)
}

fn to_outbox_record<K: EventKind>(
    aggregate_type: &str,
    event: &DomainEvent<K>,
) -> Result<OutboxRecord, DomainError> {
    let meta = &event.metadata;
    Ok(OutboxRecord {
        record_id: meta.event_id,
        tenant_id: meta.tenant_id,
        aggregate_type: aggregate_type.to_owned(),
        aggregate_id: meta.aggregate_id,
        event_type: event.event_type().to_owned(),
        payload: event.to_payload()?,
        correlation_id: meta.correlation_id,
        created_at: meta.occurred_at,
        status: OutboxStatus::Pending,
        processed_at: None,
        retry_after: None,
    })
}
