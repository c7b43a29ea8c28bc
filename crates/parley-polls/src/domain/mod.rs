//! Domain model for the Polls context.

pub mod aggregates;
pub mod commands;
pub mod events;
