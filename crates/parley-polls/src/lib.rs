//! Parley forum — Polls bounded context.
//!
//! Polls attached to threads: an open-ended list of votes, one per voter,
//! accepted until the poll is closed or its deadline passes.

pub mod application;
pub mod domain;
