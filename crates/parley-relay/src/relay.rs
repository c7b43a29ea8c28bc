//! The outbox relay loop.
//!
//! Each pass claims one batch, dispatches its records in claim order and
//! acknowledges the ones every subscribed handler accepted. A record whose
//! handler fails stays `PENDING` and is deferred for the retry backoff, which
//! holds back its whole aggregate. Later records of that aggregate in the
//! same batch are skipped, so per-aggregate order survives the retry while
//! other aggregates keep flowing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_core::clock::Clock;
use parley_core::error::DomainError;
use parley_core::outbox::{OutboxRecord, OutboxStore};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::handler::HandlerRegistry;

/// Default records per claim.
pub const DEFAULT_BATCH_SIZE: u32 = 50;

/// Default idle sleep between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default delay before a failed record's aggregate is claimable again.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of one relay pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Records in the claim.
    pub claimed: usize,
    /// Records acknowledged as `PROCESSED`.
    pub processed: usize,
    /// Records a handler rejected; each is deferred.
    pub failed: usize,
    /// Records skipped because an earlier record of their aggregate failed.
    pub deferred: usize,
}

/// Claims, dispatches and acknowledges outbox records.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxStore>,
    registry: HandlerRegistry,
    clock: Arc<dyn Clock>,
    batch_size: u32,
    poll_interval: Duration,
    retry_backoff: Duration,
}

impl OutboxRelay {
    /// Creates a relay with the default batch size, poll interval and retry
    /// backoff.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        registry: HandlerRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            outbox,
            registry,
            clock,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Sets the number of records claimed per pass.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the sleep after a pass that made no progress.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets how long a failed record holds back its aggregate.
    #[must_use]
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Runs one claim, dispatch and acknowledge pass.
    ///
    /// # Errors
    ///
    /// Returns the storage error if claiming, acknowledging or releasing
    /// fails. The claim is then dropped, so every record in it stays
    /// `PENDING` and is redelivered.
    #[instrument(skip(self), fields(batch_size = self.batch_size), err)]
    pub async fn run_once(&self) -> Result<BatchReport, DomainError> {
        let now = self.clock.now();
        let mut claim = self.outbox.claim_batch(self.batch_size, now).await?;
        let records = claim.records().to_vec();
        let mut report = BatchReport {
            claimed: records.len(),
            ..BatchReport::default()
        };
        let mut blocked: HashSet<Uuid> = HashSet::new();

        for record in &records {
            if blocked.contains(&record.aggregate_id) {
                report.deferred += 1;
                continue;
            }
            if self.dispatch(record).await {
                claim
                    .mark_processed(record.record_id, self.clock.now())
                    .await?;
                report.processed += 1;
            } else {
                claim.defer(record.record_id, self.retry_at(now)).await?;
                blocked.insert(record.aggregate_id);
                report.failed += 1;
            }
        }

        claim.release().await?;
        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                processed = report.processed,
                failed = report.failed,
                deferred = report.deferred,
                "outbox batch relayed"
            );
        }
        Ok(report)
    }

    fn retry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.retry_backoff)
            .ok()
            .and_then(|backoff| now.checked_add_signed(backoff))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns whether every subscribed handler accepted `record`. Stops at
    /// the first failure.
    async fn dispatch(&self, record: &OutboxRecord) -> bool {
        let handlers = self.registry.handlers_for(&record.event_type);
        if handlers.is_empty() {
            debug!(
                record_id = %record.record_id,
                event_type = %record.event_type,
                "no handler subscribed; acknowledging"
            );
            return true;
        }

        for handler in handlers {
            if let Err(e) = handler.handle(record).await {
                warn!(
                    handler = handler.name(),
                    record_id = %record.record_id,
                    aggregate_id = %record.aggregate_id,
                    event_type = %record.event_type,
                    error = %e,
                    "handler failed; record deferred"
                );
                return false;
            }
        }
        true
    }

    /// Polls until `shutdown` turns `true` or its sender is dropped.
    ///
    /// A pass that acknowledges nothing, or fails, is followed by a sleep of
    /// the poll interval; otherwise the next batch is claimed immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.batch_size,
            poll_interval_ms = u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "outbox relay started"
        );

        while !*shutdown.borrow() {
            let idle = match self.run_once().await {
                Ok(report) => report.processed == 0,
                Err(e) => {
                    error!(error = %e, "outbox relay pass failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    () = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("outbox relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use parley_core::context::RequestContext;
    use parley_core::outbox::OutboxStatus;
    use parley_discussion::application::command_handlers::{
        handle_change_thread_title, handle_create_thread,
    };
    use parley_discussion::domain::commands::{ChangeThreadTitle, CreateThread};
    use parley_test_support::{FailingStore, FixedClock, InMemoryStore};
    use serde_json::json;

    use super::*;
    use crate::error::HandlerError;
    use crate::handler::{AuditLogHandler, EventHandler};

    /// Records every id it sees; fails for `failing` aggregates while
    /// `broken` is set.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Uuid>>,
        failing: Mutex<HashSet<Uuid>>,
        broken: AtomicBool,
    }

    impl Recorder {
        fn seen(&self) -> Vec<Uuid> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn handle(&self, record: &OutboxRecord) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(record.record_id);
            let failing = self.failing.lock().unwrap().contains(&record.aggregate_id);
            if failing && self.broken.load(Ordering::SeqCst) {
                return Err(HandlerError::Unavailable("search index offline".into()));
            }
            Ok(())
        }
    }

    fn pending(aggregate_id: Uuid, event_type: &str, offset_secs: i64) -> OutboxRecord {
        let clock = FixedClock::default_instant();
        OutboxRecord {
            record_id: Uuid::now_v7(),
            tenant_id: Uuid::new_v4(),
            aggregate_type: "thread".to_string(),
            aggregate_id,
            event_type: event_type.to_string(),
            payload: json!({}),
            correlation_id: Uuid::new_v4(),
            created_at: clock.0 + ChronoDuration::seconds(offset_secs),
            status: OutboxStatus::Pending,
            processed_at: None,
            retry_after: None,
        }
    }

    fn relay_over(store: &InMemoryStore, registry: HandlerRegistry) -> OutboxRelay {
        relay_at(store, registry, FixedClock::default_instant())
    }

    fn relay_at(
        store: &InMemoryStore,
        registry: HandlerRegistry,
        clock: FixedClock,
    ) -> OutboxRelay {
        OutboxRelay::new(Arc::new(store.clone()), registry, Arc::new(clock))
    }

    #[tokio::test]
    async fn test_run_once_on_empty_outbox_reports_nothing() {
        let store = InMemoryStore::new();
        let relay = relay_over(&store, HandlerRegistry::new());

        let report = relay.run_once().await.unwrap();

        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_run_once_dispatches_and_acknowledges_committed_events() {
        // Arrange
        let store = InMemoryStore::new();
        let clock = FixedClock::default_instant();
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
        let thread_id = Uuid::new_v4();
        handle_create_thread(
            &CreateThread {
                thread_id,
                category_id: Uuid::new_v4(),
                title: "Welcome".to_string(),
            },
            &ctx,
            &clock,
            &store,
        )
        .await
        .unwrap();
        handle_change_thread_title(
            &ChangeThreadTitle {
                thread_id,
                title: "Welcome, all".to_string(),
            },
            &ctx,
            &clock,
            &store,
        )
        .await
        .unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut registry = HandlerRegistry::new();
        registry.subscribe("discussion.thread_title_changed", recorder.clone());
        registry.subscribe_all(Arc::new(AuditLogHandler));
        let relay = relay_over(&store, registry);

        // Act
        let report = relay.run_once().await.unwrap();

        // Assert
        assert_eq!(report.claimed, 2);
        assert_eq!(report.processed, 2);
        assert_eq!(recorder.seen().len(), 1);
        let records = store.outbox_records();
        assert!(records.iter().all(|r| r.status == OutboxStatus::Processed));
        assert!(
            records
                .iter()
                .all(|r| r.processed_at == Some(clock.0))
        );
    }

    #[tokio::test]
    async fn test_records_without_handlers_are_acknowledged() {
        let store = InMemoryStore::new();
        store.insert_outbox_record(pending(Uuid::new_v4(), "polls.vote_cast", 0));
        let relay = relay_over(&store, HandlerRegistry::new());

        let report = relay.run_once().await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_defers_rest_of_aggregate_and_retries_in_order() {
        // Arrange
        let store = InMemoryStore::new();
        let troubled = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let first = pending(troubled, "discussion.thread_created", 0);
        let second = pending(troubled, "discussion.thread_title_changed", 1);
        let other = pending(healthy, "discussion.thread_created", 2);
        let (first_id, second_id) = (first.record_id, second.record_id);
        store.insert_outbox_record(first);
        store.insert_outbox_record(second);
        store.insert_outbox_record(other);
        let recorder = Arc::new(Recorder::default());
        recorder.failing.lock().unwrap().insert(troubled);
        recorder.broken.store(true, Ordering::SeqCst);
        let mut registry = HandlerRegistry::new();
        registry.subscribe_all(recorder.clone());
        let backoff = Duration::from_secs(5);
        let relay = relay_over(&store, registry.clone()).with_retry_backoff(backoff);
        let later = relay_at(
            &store,
            registry,
            FixedClock::default_instant().advanced(ChronoDuration::seconds(5)),
        )
        .with_retry_backoff(backoff);

        // Act
        let failed_pass = relay.run_once().await.unwrap();
        recorder.broken.store(false, Ordering::SeqCst);
        recorder.seen.lock().unwrap().clear();
        let early_pass = relay.run_once().await.unwrap();
        let retry_pass = later.run_once().await.unwrap();

        // Assert
        assert_eq!(
            failed_pass,
            BatchReport {
                claimed: 3,
                processed: 1,
                failed: 1,
                deferred: 1,
            }
        );
        assert_eq!(early_pass, BatchReport::default());
        assert_eq!(retry_pass.claimed, 2);
        assert_eq!(retry_pass.processed, 2);
        assert_eq!(recorder.seen(), vec![first_id, second_id]);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_of_failing_records_does_not_starve_newer_records() {
        // Arrange
        let store = InMemoryStore::new();
        let (stuck_a, stuck_b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_outbox_record(pending(stuck_a, "discussion.post_created", 0));
        store.insert_outbox_record(pending(stuck_b, "discussion.post_created", 1));
        let fresh = pending(Uuid::new_v4(), "discussion.post_created", 2);
        let fresh_id = fresh.record_id;
        store.insert_outbox_record(fresh);
        let recorder = Arc::new(Recorder::default());
        recorder.failing.lock().unwrap().extend([stuck_a, stuck_b]);
        recorder.broken.store(true, Ordering::SeqCst);
        let mut registry = HandlerRegistry::new();
        registry.subscribe_all(recorder.clone());
        let relay = relay_over(&store, registry).with_batch_size(2);

        // Act
        let first_pass = relay.run_once().await.unwrap();
        let second_pass = relay.run_once().await.unwrap();

        // Assert
        assert_eq!(first_pass.claimed, 2);
        assert_eq!(first_pass.failed, 2);
        assert_eq!(
            second_pass,
            BatchReport {
                claimed: 1,
                processed: 1,
                failed: 0,
                deferred: 0,
            }
        );
        let fresh_row = store
            .outbox_records()
            .into_iter()
            .find(|r| r.record_id == fresh_id)
            .unwrap();
        assert_eq!(fresh_row.status, OutboxStatus::Processed);
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_record_is_deferred_by_the_retry_backoff() {
        let store = InMemoryStore::new();
        let troubled = Uuid::new_v4();
        store.insert_outbox_record(pending(troubled, "discussion.post_created", 0));
        let recorder = Arc::new(Recorder::default());
        recorder.failing.lock().unwrap().insert(troubled);
        recorder.broken.store(true, Ordering::SeqCst);
        let mut registry = HandlerRegistry::new();
        registry.subscribe_all(recorder);
        let relay = relay_over(&store, registry).with_retry_backoff(Duration::from_secs(90));

        relay.run_once().await.unwrap();

        let rows = store.outbox_records();
        let row = &rows[0];
        assert_eq!(row.status, OutboxStatus::Pending);
        assert_eq!(
            row.retry_after,
            Some(FixedClock::default_instant().0 + ChronoDuration::seconds(90))
        );
    }

    #[tokio::test]
    async fn test_batch_size_limits_each_pass() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.insert_outbox_record(pending(Uuid::new_v4(), "discussion.post_created", i));
        }
        let relay = relay_over(&store, HandlerRegistry::new()).with_batch_size(2);

        let report = relay.run_once().await.unwrap();

        assert_eq!(report.claimed, 2);
        assert_eq!(store.pending_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_once_propagates_claim_failure() {
        let relay = OutboxRelay::new(
            Arc::new(FailingStore),
            HandlerRegistry::new(),
            Arc::new(FixedClock::default_instant()),
        );

        let result = relay.run_once().await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_run_drains_outbox_then_stops_on_shutdown() {
        // Arrange
        let store = InMemoryStore::new();
        for i in 0..7 {
            store.insert_outbox_record(pending(Uuid::new_v4(), "discussion.post_created", i));
        }
        let relay = Arc::new(
            relay_over(&store, HandlerRegistry::new())
                .with_batch_size(3)
                .with_poll_interval(Duration::from_millis(10)),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.run(shutdown_rx).await })
        };

        // Act
        for _ in 0..200 {
            if store.pending_count().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown_tx.send(true).unwrap();

        // Assert
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_is_dropped() {
        let store = InMemoryStore::new();
        let relay = relay_over(&store, HandlerRegistry::new())
            .with_poll_interval(Duration::from_secs(60));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(5), relay.run(shutdown_rx))
            .await
            .unwrap();
    }
}
