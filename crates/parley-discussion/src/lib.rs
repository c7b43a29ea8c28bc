//! Parley forum — Discussion bounded context.
//!
//! Threads and the posts inside them. Every mutation records a domain event
//! that the persister writes to the outbox alongside the new state.

pub mod application;
pub mod domain;
