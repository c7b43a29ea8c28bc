//! Application services for the Messaging context.

pub mod command_handlers;
