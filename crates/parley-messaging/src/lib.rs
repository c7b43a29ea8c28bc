//! Parley forum — Messaging bounded context.
//!
//! Private threads between a fixed set of members. Only members may post,
//! invite or leave.

pub mod application;
pub mod domain;
