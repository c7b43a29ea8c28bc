//! Command handlers for the Discussion context.
//!
//! Each handler loads or constructs the aggregate, calls its mutation, and
//! hands it to the persister, which commits the state and its events in one
//! transaction.

use parley_core::clock::Clock;
use parley_core::context::RequestContext;
use parley_core::error::DomainError;
use parley_core::persister::{self, SaveReceipt};
use parley_core::repository::AggregateStore;
use tracing::{info, instrument};

use crate::domain::aggregates::{Post, Thread};
use crate::domain::commands::{
    ChangeThreadTitle, CloseThread, CreatePost, CreateThread, DeletePost, EditPost, MoveThread,
    PinThread,
};

/// Handles the `CreateThread` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a bad title, or a persistence error.
#[instrument(skip_all, fields(thread_id = %command.thread_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_create_thread(
    command: &CreateThread,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread = Thread::create(
        command.thread_id,
        command.category_id,
        &command.title,
        ctx,
        clock,
    )?;
    let receipt = persister::save(&mut thread, clock, store).await?;
    info!(correlation_id = %ctx.correlation_id, "thread created");
    Ok(receipt)
}

/// Handles the `ChangeThreadTitle` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` for a closed
/// thread, `Validation` for a bad title, or a persistence error.
#[instrument(skip_all, fields(thread_id = %command.thread_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_change_thread_title(
    command: &ChangeThreadTitle,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: Thread = persister::load(store, ctx.tenant_id, command.thread_id).await?;
    thread.change_title(&command.title, ctx, clock)?;
    persister::save(&mut thread, clock, store).await
}

/// Handles the `MoveThread` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` for a closed
/// thread, or a persistence error.
#[instrument(skip_all, fields(thread_id = %command.thread_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_move_thread(
    command: &MoveThread,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: Thread = persister::load(store, ctx.tenant_id, command.thread_id).await?;
    thread.move_to_category(command.category_id, ctx, clock)?;
    persister::save(&mut thread, clock, store).await
}

/// Handles the `PinThread` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` for a closed
/// thread, or a persistence error.
#[instrument(skip_all, fields(thread_id = %command.thread_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_pin_thread(
    command: &PinThread,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: Thread = persister::load(store, ctx.tenant_id, command.thread_id).await?;
    thread.set_pinned(command.pinned, ctx, clock)?;
    persister::save(&mut thread, clock, store).await
}

/// Handles the `CloseThread` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` if already
/// closed, or a persistence error.
#[instrument(skip_all, fields(thread_id = %command.thread_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_close_thread(
    command: &CloseThread,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut thread: Thread = persister::load(store, ctx.tenant_id, command.thread_id).await?;
    thread.close(ctx, clock)?;
    let receipt = persister::save(&mut thread, clock, store).await?;
    info!(correlation_id = %ctx.correlation_id, "thread closed");
    Ok(receipt)
}

/// Handles the `CreatePost` command. The parent thread must exist for the
/// tenant and be open.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for a missing thread,
/// `InvalidState` for a closed thread, `Validation` for blank content, or a
/// persistence error.
#[instrument(
    skip_all,
    fields(post_id = %command.post_id, thread_id = %command.thread_id, tenant_id = %ctx.tenant_id)
)]
pub async fn handle_create_post(
    command: &CreatePost,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let thread: Thread = persister::load(store, ctx.tenant_id, command.thread_id).await?;
    if !thread.is_open() {
        return Err(DomainError::InvalidState(format!(
            "thread {} is closed to replies",
            command.thread_id
        )));
    }

    let mut post = Post::create(
        command.post_id,
        command.thread_id,
        &command.content,
        ctx,
        clock,
    )?;
    persister::save(&mut post, clock, store).await
}

/// Handles the `EditPost` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` for a deleted
/// post, `Validation` for blank content, or a persistence error.
#[instrument(skip_all, fields(post_id = %command.post_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_edit_post(
    command: &EditPost,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut post: Post = persister::load(store, ctx.tenant_id, command.post_id).await?;
    post.edit_content(&command.content, ctx, clock)?;
    persister::save(&mut post, clock, store).await
}

/// Handles the `DeletePost` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `InvalidState` if already
/// deleted, or a persistence error.
#[instrument(skip_all, fields(post_id = %command.post_id, tenant_id = %ctx.tenant_id))]
pub async fn handle_delete_post(
    command: &DeletePost,
    ctx: &RequestContext,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
) -> Result<SaveReceipt, DomainError> {
    let mut post: Post = persister::load(store, ctx.tenant_id, command.post_id).await?;
    post.delete(&command.reason, ctx, clock)?;
    persister::save(&mut post, clock, store).await
}
