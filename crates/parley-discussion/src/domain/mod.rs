//! Domain model for the Discussion context.

pub mod aggregates;
pub mod commands;
pub mod events;
