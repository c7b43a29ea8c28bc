//! Application services for the Polls context.

pub mod command_handlers;
