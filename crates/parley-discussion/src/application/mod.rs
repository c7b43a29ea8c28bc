//! Application services for the Discussion context.

pub mod command_handlers;
