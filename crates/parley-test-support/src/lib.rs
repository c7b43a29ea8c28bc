//! Shared test doubles for the Parley forum backend.

mod clock;
mod store;

pub use clock::FixedClock;
pub use store::{FailPoint, FailingStore, InMemoryStore};
