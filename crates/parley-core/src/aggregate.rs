//! Aggregate root abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{DomainEvent, EventKind};
use crate::repository::AggregateRecord;

/// Trait for aggregate roots persisted as state snapshots with an outbox.
///
/// Every state-changing method records exactly one event into the
/// aggregate's private [`EventJournal`](crate::journal::EventJournal) before
/// returning, and records nothing when the call changes nothing. Read-only
/// accessors never touch the journal.
pub trait AggregateRoot: Send + Sync + Sized {
    /// The event payload variants this aggregate produces.
    type Kind: EventKind;

    /// Stable aggregate type name, stored alongside the state and the outbox
    /// records.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the owning tenant.
    fn tenant_id(&self) -> Uuid;

    /// Returns the persisted version; `0` for an aggregate never saved.
    fn version(&self) -> i64;

    /// Returns the persisted representation of the current field values.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the state cannot be encoded.
    fn snapshot(&self) -> Result<serde_json::Value, DomainError>;

    /// Rebuilds the aggregate from its persisted representation with an
    /// empty journal.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the stored state is unreadable.
    fn restore(record: AggregateRecord) -> Result<Self, DomainError>;

    /// Empties the journal, returning pending events in program order.
    fn drain_events(&mut self) -> Vec<DomainEvent<Self::Kind>>;

    /// Returns events from a failed save to the front of the journal.
    fn requeue_events(&mut self, events: Vec<DomainEvent<Self::Kind>>);

    /// Records the version assigned by a successful save.
    fn mark_saved(&mut self, version: i64);
}

/// Encodes an aggregate's state struct as a JSON object.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if encoding fails or the state does
/// not encode to an object.
pub fn encode_state<S: Serialize>(state: &S) -> Result<serde_json::Value, DomainError> {
    let value = serde_json::to_value(state)?;
    if !value.is_object() {
        return Err(DomainError::Serialization(
            "aggregate state must encode to a JSON object".to_owned(),
        ));
    }
    Ok(value)
}

/// Decodes the state struct of aggregate type `expected_type` from a record.
///
/// Keys in the stored object that the state struct does not declare are
/// ignored; they stay in storage untouched.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if the record holds another
/// aggregate type or the stored state does not match the struct.
pub fn decode_state<S: DeserializeOwned>(
    record: &AggregateRecord,
    expected_type: &str,
) -> Result<S, DomainError> {
    if record.aggregate_type != expected_type {
        return Err(DomainError::Serialization(format!(
            "record {} holds a {} aggregate, not {expected_type}",
            record.aggregate_id, record.aggregate_type
        )));
    }
    serde_json::from_value(record.state.clone()).map_err(|e| {
        DomainError::Serialization(format!(
            "stored {expected_type} state for {} is unreadable: {e}",
            record.aggregate_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        count: u32,
    }

    fn record(aggregate_type: &str, state: serde_json::Value) -> AggregateRecord {
        AggregateRecord {
            aggregate_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            aggregate_type: aggregate_type.to_owned(),
            state,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_encode_state_rejects_non_object_state() {
        let result = encode_state(&42);

        assert!(matches!(result, Err(DomainError::Serialization(_))));
    }

    #[test]
    fn test_decode_state_ignores_keys_the_struct_does_not_carry() {
        let stored = record(
            "counter",
            serde_json::json!({ "count": 3, "hidden_by_moderator": true }),
        );

        let state: Counter = decode_state(&stored, "counter").unwrap();

        assert_eq!(state, Counter { count: 3 });
    }

    #[test]
    fn test_decode_state_rejects_wrong_aggregate_type() {
        let stored = record("poll", serde_json::json!({ "count": 3 }));

        let result: Result<Counter, _> = decode_state(&stored, "counter");

        assert!(matches!(result, Err(DomainError::Serialization(_))));
    }
}
