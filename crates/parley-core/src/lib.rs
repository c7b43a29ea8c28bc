//! Parley Core — event capture and outbox contracts.
//!
//! Aggregates record domain events into an in-memory journal; the persister
//! writes the aggregate's state together with its drained journal into the
//! outbox in one transaction; relays claim pending outbox records through
//! [`outbox::OutboxStore`]. This crate contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod context;
pub mod error;
pub mod event;
pub mod journal;
pub mod outbox;
pub mod persister;
pub mod repository;
