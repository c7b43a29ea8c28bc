//! Command handlers for the Polls context.

use parley_core::clock::Clock;
use parley_core::context::RequestContext;
use parley_core::error::DomainError;
use parley_core::persister::{self, SaveReceipt};
use parley_core::repository::AggregateStore;
use tracing::{debug, instrument};

use crate::domain::aggregates::Poll;
use crate::domain::commands::{CastVote, ClosePoll, CreatePoll};

/// Handles the `CreatePoll` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a bad question, options or
/// deadline, or a persistence error.
#[instrument(skip_all, fields(poll_id = %command.poll_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_create_poll(
    command: &CreatePoll,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut poll = Poll::create(
        command.poll_id,
        command.thread_id,
        &command.question,
        &command.options,
        command.closes_at,
        ctx,
        clock,
    )?;
    persister::save(&mut poll, clock, store).await
}

/// Handles the `CastVote` command for the acting user.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` for a closed or
/// expired poll, `Validation` for an unknown option or repeat vote, or a
/// persistence error.
#[instrument(skip_all, fields(poll_id = %command.poll_id, voter_id = %ctx.actor_id))]
pub async fn handle_cast_vote(
    command: &CastVote,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut poll: Poll = persister::load(store, ctx.tenant_id, command.poll_id).await?;
    poll.vote(command.option_index, ctx, clock)?;
    let receipt = persister::save(&mut poll, clock, store).await?;
    debug!(option_index = command.option_index, "vote recorded");
    Ok(receipt)
}

/// Handles the `ClosePoll` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` if already
/// closed, or a persistence error.
#[instrument(skip_all, fields(poll_id = %command.poll_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_close_poll(
    command: &ClosePoll,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut poll: Poll = persister::load(store, ctx.tenant_id, command.poll_id).await?;
    poll.close(ctx, clock)?;
    persister::save(&mut poll, clock, store).await
}
