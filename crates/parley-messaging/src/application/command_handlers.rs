//! Command handlers for the Messaging context.

use parley_core::clock::Clock;
use parley_core::context::RequestContext;
use parley_core::error::DomainError;
use parley_core::persister::{self, SaveReceipt};
use parley_core::repository::AggregateStore;
use tracing::instrument;

use crate::domain::aggregates::PrivateThread;
use crate::domain::commands::{AddParticipant, LeavePrivateThread, PostMessage, StartPrivateThread};

/// Handles the `StartPrivateThread` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank subject or too few
/// members, or a persistence error.
#[instrument(skip_all, fields(private_thread_id = %command.private_thread_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_start_private_thread(
    command: &StartPrivateThread,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread = PrivateThread::start(
        command.private_thread_id,
        &command.subject,
        &command.participants,
        ctx,
        clock,
    )?;
    persister::save(&mut thread, clock, store).await
}

/// Handles the `AddParticipant` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `Validation` when the actor is
/// not a member, or a persistence error.
#[instrument(skip_all, fields(private_thread_id = %command.private_thread_id, participant_id = %command.participant_id))]
pub async fn handle_add_participant(
    command: &AddParticipant,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: PrivateThread =
        persister::load(store, ctx.tenant_id, command.private_thread_id).await?;
    thread.add_participant(command.participant_id, ctx, clock)?;
    persister::save(&mut thread, clock, store).await
}

/// Handles the `LeavePrivateThread` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `Validation` when the actor is
/// not a member, or a persistence error.
#[instrument(skip_all, fields(private_thread_id = %command.private_thread_id, actor_id = %ctx.actor_id))]
pub async fn handle_leave_private_thread(
    command: &LeavePrivateThread,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: PrivateThread =
        persister::load(store, ctx.tenant_id, command.private_thread_id).await?;
    thread.leave(ctx, clock)?;
    persister::save(&mut thread, clock, store).await
}

/// Handles the `PostMessage` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `Validation` for outsiders or a
/// blank body, or a persistence error.
#[instrument(skip_all, fields(private_thread_id = %command.private_thread_id, message_id = %command.message_id))]
pub async fn handle_post_message(
    command: &PostMessage,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: PrivateThread =
        persister::load(store, ctx.tenant_id, command.private_thread_id).await?;
    thread.post_message(command.message_id, &command.body, ctx, clock)?;
    persister::save(&mut thread, clock, store).await
}

#[cfg(test)]
mod tests {
    use parley_test_support::{FailPoint, FixedClock, InMemoryStore};
    use uuid::Uuid;

    use super::*;
    use crate::domain::events::{MESSAGE_POSTED_EVENT_TYPE, PRIVATE_THREAD_STARTED_EVENT_TYPE};

    async fn seed(ctx: &RequestContext, other: Uuid, clock: &FixedClock, store: &InMemoryStore) -> Uuid {
        let private_thread_id = Uuid::new_v4();
        handle_start_private_thread(
            &StartPrivateThread {
                private_thread_id,
                subject: "Moderator handover".to_owned(),
                participants: vec![other],
            },
            ctx,
            clock,
            store,
        )
        .await
        .unwrap();
        private_thread_id
    }

    #[tokio::test]
    async fn test_handle_start_private_thread_writes_state_and_event() {
        let clock = FixedClock::default_instant();
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
        let store = InMemoryStore::new();

        let private_thread_id = seed(&ctx, Uuid::new_v4(), &clock, &store).await;

        let row = store.aggregate(private_thread_id).unwrap();
        assert_eq!(row.aggregate_type, "private_thread");
        assert_eq!(row.version, 1);
        let outbox = store.outbox_records();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event_type, PRIVATE_THREAD_STARTED_EVENT_TYPE);
        assert_eq!(outbox[0].correlation_id, ctx.correlation_id);
    }

    #[tokio::test]
    async fn test_handle_post_message_by_outsider_writes_nothing() {
        // Arrange
        let clock = FixedClock::default_instant();
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
        let store = InMemoryStore::new();
        let private_thread_id = seed(&ctx, Uuid::new_v4(), &clock, &store).await;
        let outsider = ctx.with_actor(Uuid::new_v4());

        // Act
        let result = handle_post_message(
            &PostMessage {
                private_thread_id,
                message_id: Uuid::new_v4(),
                body: "let me in".to_owned(),
            },
            &outsider,
            &clock,
            &store,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.aggregate(private_thread_id).unwrap().version, 1);
        assert_eq!(store.outbox_records().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_post_message_failed_outbox_write_leaves_state_untouched() {
        // Arrange
        let clock = FixedClock::default_instant();
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
        let healthy = InMemoryStore::new();
        let private_thread_id = seed(&ctx, Uuid::new_v4(), &clock, &healthy).await;
        let store = healthy.with_fail_point(FailPoint::OutboxWrite);

        // Act
        let result = handle_post_message(
            &PostMessage {
                private_thread_id,
                message_id: Uuid::new_v4(),
                body: "handover done".to_owned(),
            },
            &ctx,
            &clock,
            &store,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        let row = healthy.aggregate(private_thread_id).unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.state["message_count"], 0);
        assert_eq!(healthy.outbox_records().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_add_then_leave_round_trips_membership() {
        let clock = FixedClock::default_instant();
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
        let store = InMemoryStore::new();
        let private_thread_id = seed(&ctx, Uuid::new_v4(), &clock, &store).await;
        let newcomer = Uuid::new_v4();

        handle_add_participant(
            &AddParticipant {
                private_thread_id,
                participant_id: newcomer,
            },
            &ctx,
            &clock,
            &store,
        )
        .await
        .unwrap();
        let receipt = handle_leave_private_thread(
            &LeavePrivateThread { private_thread_id },
            &ctx.with_actor(newcomer),
            &clock,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(receipt.version, 3);
        let participants = store.aggregate(private_thread_id).unwrap().state["participants"].clone();
        assert_eq!(participants.as_array().unwrap().len(), 2);
        assert_eq!(store.outbox_records().len(), 3);
    }

    #[tokio::test]
    async fn test_handle_post_message_increments_count() {
        let clock = FixedClock::default_instant();
        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
        let store = InMemoryStore::new();
        let private_thread_id = seed(&ctx, Uuid::new_v4(), &clock, &store).await;

        handle_post_message(
            &PostMessage {
                private_thread_id,
                message_id: Uuid::new_v4(),
                body: "Welcome aboard".to_owned(),
            },
            &ctx,
            &clock,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(store.aggregate(private_thread_id).unwrap().state["message_count"], 1);
        let last = store.outbox_records().pop().unwrap();
        assert_eq!(last.event_type, MESSAGE_POSTED_EVENT_TYPE);
    }
}
