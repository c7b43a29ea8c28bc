//! Integration tests for `PgOutboxStore` and its skip-locked claims.

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parley_core::error::DomainError;
use parley_core::outbox::{OutboxRecord, OutboxStatus, OutboxStore};
use parley_core::repository::{AggregateStore, AggregateWrite, UnitOfWork};
use parley_store::pg_aggregate_store::PgAggregateStore;
use parley_store::pg_outbox_store::PgOutboxStore;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Commits one aggregate carrying `count` pending outbox records, each one
/// second newer than the last. Returns the record ids in creation order.
async fn seed_pending(pool: &PgPool, count: i64) -> Vec<Uuid> {
    let tenant_id = Uuid::new_v4();
    let aggregate_id = Uuid::new_v4();
    let outbox: Vec<OutboxRecord> = (0..count)
        .map(|i| OutboxRecord {
            record_id: Uuid::now_v7(),
            tenant_id,
            aggregate_type: "thread".to_string(),
            aggregate_id,
            event_type: "discussion.thread_title_changed".to_string(),
            payload: json!({"TitleChanged": {"new_title": format!("title {i}")}}),
            correlation_id: Uuid::new_v4(),
            created_at: base_time() + Duration::seconds(i),
            status: OutboxStatus::Pending,
            processed_at: None,
            retry_after: None,
        })
        .collect();
    let ids = outbox.iter().map(|r| r.record_id).collect();

    PgAggregateStore::new(pool.clone())
        .commit(UnitOfWork {
            state: AggregateWrite {
                aggregate_id,
                tenant_id,
                aggregate_type: "thread".to_string(),
                state: json!({"title": "seed"}),
                expected_version: 0,
                written_at: base_time(),
            },
            outbox,
        })
        .await
        .unwrap();
    ids
}

fn ids(records: &[OutboxRecord]) -> Vec<Uuid> {
    records.iter().map(|r| r.record_id).collect()
}

// --- claim ordering ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_claim_returns_oldest_pending_records_first(pool: PgPool) {
    let seeded = seed_pending(&pool, 5).await;
    let store = PgOutboxStore::new(pool);

    let claim = store.claim_batch(3, base_time()).await.unwrap();

    assert_eq!(ids(claim.records()), seeded[..3].to_vec());
    assert!(
        claim
            .records()
            .iter()
            .all(|r| r.status == OutboxStatus::Pending)
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_claim_on_empty_outbox_is_empty(pool: PgPool) {
    let store = PgOutboxStore::new(pool);

    let claim = store.claim_batch(50, base_time()).await.unwrap();

    assert!(claim.records().is_empty());
    claim.release().await.unwrap();
}

// --- competing claimants ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_claims_never_overlap(pool: PgPool) {
    // Arrange
    let seeded = seed_pending(&pool, 80).await;
    let relay_a = PgOutboxStore::new(pool.clone());
    let relay_b = PgOutboxStore::new(pool);

    // Act
    let (claim_a, claim_b) = tokio::join!(
        relay_a.claim_batch(50, base_time()),
        relay_b.claim_batch(50, base_time())
    );
    let claim_a = claim_a.unwrap();
    let claim_b = claim_b.unwrap();

    // Assert
    let mut union: HashSet<Uuid> = HashSet::new();
    for id in ids(claim_a.records()).into_iter().chain(ids(claim_b.records())) {
        assert!(union.insert(id), "record {id} claimed twice");
    }
    assert_eq!(union.len(), 80);
    assert_eq!(union, seeded.into_iter().collect::<HashSet<_>>());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_held_claim_hides_its_rows_from_the_next_claimant(pool: PgPool) {
    seed_pending(&pool, 10).await;
    let store = PgOutboxStore::new(pool);

    let first = store.claim_batch(6, base_time()).await.unwrap();
    let second = store.claim_batch(6, base_time()).await.unwrap();

    assert_eq!(first.records().len(), 6);
    assert_eq!(second.records().len(), 4);
    let first_ids: HashSet<Uuid> = ids(first.records()).into_iter().collect();
    assert!(ids(second.records()).iter().all(|id| !first_ids.contains(id)));
}

// --- acknowledgement ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_release_commits_processed_marks(pool: PgPool) {
    // Arrange
    let seeded = seed_pending(&pool, 3).await;
    let store = PgOutboxStore::new(pool.clone());
    let processed_at = base_time() + Duration::hours(1);
    let mut claim = store.claim_batch(10, base_time()).await.unwrap();

    // Act
    claim.mark_processed(seeded[0], processed_at).await.unwrap();
    claim.mark_processed(seeded[1], processed_at).await.unwrap();
    claim.release().await.unwrap();

    // Assert
    assert_eq!(store.pending_count().await.unwrap(), 1);
    let next = store.claim_batch(10, base_time()).await.unwrap();
    assert_eq!(ids(next.records()), vec![seeded[2]]);
    let (status, stamped): (String, Option<DateTime<Utc>>) = sqlx::query_as(
        "SELECT status, processed_at FROM outbox_events WHERE record_id = $1",
    )
    .bind(seeded[0])
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "PROCESSED");
    assert_eq!(stamped, Some(processed_at));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_dropped_claim_rolls_back_and_records_are_reclaimable(pool: PgPool) {
    // Arrange
    let seeded = seed_pending(&pool, 4).await;
    let store = PgOutboxStore::new(pool);
    let mut claim = store.claim_batch(10, base_time()).await.unwrap();
    claim.mark_processed(seeded[0], base_time()).await.unwrap();

    // Act
    drop(claim);
    let reclaimed = store.claim_batch(10, base_time()).await.unwrap();

    // Assert
    assert_eq!(ids(reclaimed.records()), seeded);
    assert_eq!(store.pending_count().await.unwrap(), 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_mark_processed_rejects_records_outside_the_claim(pool: PgPool) {
    let seeded = seed_pending(&pool, 2).await;
    let store = PgOutboxStore::new(pool);
    let mut claim = store.claim_batch(1, base_time()).await.unwrap();

    let result = claim.mark_processed(seeded[1], base_time()).await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_pending_count_counts_only_pending(pool: PgPool) {
    let seeded = seed_pending(&pool, 7).await;
    let store = PgOutboxStore::new(pool);
    let mut claim = store.claim_batch(2, base_time()).await.unwrap();
    claim.mark_processed(seeded[0], base_time()).await.unwrap();
    claim.release().await.unwrap();

    let pending = store.pending_count().await.unwrap();

    assert_eq!(pending, 6);
}

// --- deferral ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_deferred_aggregate_does_not_starve_newer_aggregates(pool: PgPool) {
    // Arrange
    let stuck = seed_pending(&pool, 1).await;
    let healthy = seed_pending(&pool, 1).await;
    let store = PgOutboxStore::new(pool);
    let retry_after = base_time() + Duration::seconds(30);
    let mut claim = store.claim_batch(1, base_time()).await.unwrap();
    assert_eq!(ids(claim.records()), stuck);
    claim.defer(stuck[0], retry_after).await.unwrap();
    claim.release().await.unwrap();

    // Act
    let during = store
        .claim_batch(1, base_time() + Duration::seconds(10))
        .await
        .unwrap();
    let during_ids = ids(during.records());
    drop(during);
    let after = store.claim_batch(10, retry_after).await.unwrap();

    // Assert
    assert_eq!(during_ids, healthy);
    assert_eq!(ids(after.records()), [stuck, healthy].concat());
    assert_eq!(after.records()[0].retry_after, Some(retry_after));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_defer_rejects_records_outside_the_claim(pool: PgPool) {
    let seeded = seed_pending(&pool, 2).await;
    let store = PgOutboxStore::new(pool);
    let mut claim = store.claim_batch(1, base_time()).await.unwrap();

    let result = claim.defer(seeded[1], base_time()).await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
}
