//! Domain model for the Messaging context.

pub mod aggregates;
pub mod commands;
pub mod events;
