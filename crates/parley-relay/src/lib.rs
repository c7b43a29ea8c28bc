//! Parley forum — outbox relay.
//!
//! Claims pending outbox records in batches, dispatches each to the
//! handlers subscribed to its event type, and acknowledges the ones every
//! handler accepted. Also serves a small operational HTTP surface.

pub mod config;
pub mod error;
pub mod handler;
pub mod relay;
pub mod routes;
pub mod state;
