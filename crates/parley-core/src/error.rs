//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Every variant surfaces synchronously to the immediate caller. A failed
/// mutation or save leaves the system in its pre-call state.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found for the requesting tenant.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The version the writer loaded.
        expected: i64,
        /// The version currently persisted.
        actual: i64,
    },

    /// Bad mutation input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Mutation attempted in an incompatible (usually terminal) state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A state snapshot or event payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
