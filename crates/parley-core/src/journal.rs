//! Per-aggregate event journal.

/// Append-only buffer of events produced by an aggregate's mutations.
///
/// Aggregates keep the journal private and call [`EventJournal::record`]
/// from their mutation methods only. Persistence code empties it with
/// [`EventJournal::drain`]; business logic never inspects it.
#[derive(Debug)]
pub struct EventJournal<E> {
    pending: Vec<E>,
}

impl<E> EventJournal<E> {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Appends an event, preserving insertion order.
    pub fn record(&mut self, event: E) {
        self.pending.push(event);
    }

    /// Returns every pending event in insertion order and leaves the journal
    /// empty. A second drain without an intervening `record` yields nothing.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }

    /// Puts drained events back ahead of anything recorded since the drain,
    /// so a failed save can be retried without losing them.
    pub fn requeue(&mut self, mut events: Vec<E>) {
        events.append(&mut self.pending);
        self.pending = events;
    }
}

impl<E> Default for EventJournal<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_events_in_insertion_order() {
        // Arrange
        let mut journal = EventJournal::new();
        journal.record("created");
        journal.record("edited");
        journal.record("deleted");

        // Act
        let drained = journal.drain();

        // Assert
        assert_eq!(drained, vec!["created", "edited", "deleted"]);
    }

    #[test]
    fn test_second_drain_without_mutation_is_empty() {
        let mut journal = EventJournal::new();
        journal.record(1);

        let first = journal.drain();
        let second = journal.drain();

        assert_eq!(first, vec![1]);
        assert!(second.is_empty());
    }

    #[test]
    fn test_record_after_drain_starts_a_fresh_batch() {
        let mut journal = EventJournal::new();
        journal.record(1);
        let _ = journal.drain();

        journal.record(2);

        assert_eq!(journal.drain(), vec![2]);
    }

    #[test]
    fn test_requeue_restores_drained_events_ahead_of_newer_ones() {
        // Arrange
        let mut journal = EventJournal::new();
        journal.record("created");
        journal.record("edited");
        let drained = journal.drain();
        journal.record("deleted");

        // Act
        journal.requeue(drained);

        // Assert
        assert_eq!(journal.drain(), vec!["created", "edited", "deleted"]);
    }
}
