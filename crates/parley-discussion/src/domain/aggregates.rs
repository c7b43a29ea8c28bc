//! Aggregate roots for the Discussion context.
//!
//! Every mutation follows the same shape: state guard, input validation,
//! no-op check, then mutate and record exactly one event.

use parley_core::aggregate::{AggregateRoot, decode_state, encode_state};
use parley_core::clock::Clock;
use parley_core::context::RequestContext;
use parley_core::error::DomainError;
use parley_core::event::DomainEvent;
use parley_core::journal::EventJournal;
use parley_core::repository::AggregateRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    PostContentEdited, PostCreated, PostDeleted, PostEvent, PostEventKind, ThreadClosed,
    ThreadCreated, ThreadEvent, ThreadEventKind, ThreadMoved, ThreadPinChanged,
    ThreadTitleChanged,
};

/// Longest accepted thread title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

fn validated_title(title: &str) -> Result<&str, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::Validation("thread title must not be blank".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(DomainError::Validation(format!(
            "thread title exceeds {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title)
}

fn validated_content(content: &str) -> Result<&str, DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::Validation("post content must not be blank".into()));
    }
    Ok(content)
}

/// Lifecycle of a thread. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadStatus {
    /// Accepting replies and edits.
    Open,
    /// Read-only.
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThreadState {
    tenant_id: Uuid,
    category_id: Uuid,
    author_id: Uuid,
    title: String,
    pinned: bool,
    status: ThreadStatus,
}

/// The aggregate root for a discussion thread.
#[derive(Debug)]
pub struct Thread {
    id: Uuid,
    version: i64,
    state: ThreadState,
    journal: EventJournal<ThreadEvent>,
}

impl Thread {
    /// Opens a new thread, recording `ThreadCreated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is blank or too long.
    pub fn create(
        thread_id: Uuid,
        category_id: Uuid,
        title: &str,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let title = validated_title(title)?.to_owned();
        let mut thread = Self {
            id: thread_id,
            version: 0,
            state: ThreadState {
                tenant_id: ctx.tenant_id,
                category_id,
                author_id: ctx.actor_id,
                title: title.clone(),
                pinned: false,
                status: ThreadStatus::Open,
            },
            journal: EventJournal::new(),
        };
        thread.record(
            ctx,
            clock,
            ThreadEventKind::Created(ThreadCreated {
                thread_id,
                category_id,
                author_id: ctx.actor_id,
                title,
            }),
        );
        Ok(thread)
    }

    /// The current title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.state.title
    }

    /// The category the thread is filed under.
    #[must_use]
    pub fn category_id(&self) -> Uuid {
        self.state.category_id
    }

    /// The user who opened the thread.
    #[must_use]
    pub fn author_id(&self) -> Uuid {
        self.state.author_id
    }

    /// Whether the thread is pinned.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.state.pinned
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        self.state.status
    }

    /// Whether the thread accepts replies.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.status == ThreadStatus::Open
    }

    /// Retitles the thread, recording `ThreadTitleChanged` unless the title
    /// is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the thread is closed, or
    /// `DomainError::Validation` if the title is blank or too long.
    pub fn change_title(
        &mut self,
        new_title: &str,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        let new_title = validated_title(new_title)?;
        if new_title == self.state.title {
            return Ok(());
        }

        let old_title = std::mem::replace(&mut self.state.title, new_title.to_owned());
        self.record(
            ctx,
            clock,
            ThreadEventKind::TitleChanged(ThreadTitleChanged {
                thread_id: self.id,
                old_title,
                new_title: new_title.to_owned(),
                changed_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    /// Files the thread under another category, recording `ThreadMoved`
    /// unless it is already there.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the thread is closed.
    pub fn move_to_category(
        &mut self,
        category_id: Uuid,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        if category_id == self.state.category_id {
            return Ok(());
        }

        let from_category_id = std::mem::replace(&mut self.state.category_id, category_id);
        self.record(
            ctx,
            clock,
            ThreadEventKind::Moved(ThreadMoved {
                thread_id: self.id,
                from_category_id,
                to_category_id: category_id,
                moved_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    /// Pins or unpins the thread, recording `ThreadPinChanged` unless the
    /// flag already has that value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the thread is closed.
    pub fn set_pinned(
        &mut self,
        pinned: bool,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        if pinned == self.state.pinned {
            return Ok(());
        }

        self.state.pinned = pinned;
        self.record(
            ctx,
            clock,
            ThreadEventKind::PinChanged(ThreadPinChanged {
                thread_id: self.id,
                pinned,
                changed_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    /// Closes the thread, recording `ThreadClosed`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the thread is already closed.
    pub fn close(&mut self, ctx: &RequestContext, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.state.status == ThreadStatus::Closed {
            return Err(DomainError::InvalidState(format!(
                "thread {} is already closed",
                self.id
            )));
        }

        self.state.status = ThreadStatus::Closed;
        self.record(
            ctx,
            clock,
            ThreadEventKind::Closed(ThreadClosed {
                thread_id: self.id,
                closed_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.state.status == ThreadStatus::Closed {
            return Err(DomainError::InvalidState(format!(
                "thread {} is closed",
                self.id
            )));
        }
        Ok(())
    }

    fn record(&mut self, ctx: &RequestContext, clock: &dyn Clock, kind: ThreadEventKind) {
        let event = DomainEvent::new(self.id, self.state.tenant_id, ctx, clock, kind);
        self.journal.record(event);
    }
}

impl AggregateRoot for Thread {
    type Kind = ThreadEventKind;
    const AGGREGATE_TYPE: &'static str = "thread";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Uuid {
        self.state.tenant_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn snapshot(&self) -> Result<serde_json::Value, DomainError> {
        encode_state(&self.state)
    }

    fn restore(record: AggregateRecord) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.aggregate_id,
            version: record.version,
            state: decode_state(&record, Self::AGGREGATE_TYPE)?,
            journal: EventJournal::new(),
        })
    }

    fn drain_events(&mut self) -> Vec<ThreadEvent> {
        self.journal.drain()
    }

    fn requeue_events(&mut self, events: Vec<ThreadEvent>) {
        self.journal.requeue(events);
    }

    fn mark_saved(&mut self, version: i64) {
        self.version = version;
    }
}

/// Lifecycle of a post. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    /// Visible and editable.
    Active,
    /// Soft-deleted.
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PostState {
    tenant_id: Uuid,
    thread_id: Uuid,
    author_id: Uuid,
    content: String,
    status: PostStatus,
    deletion_reason: Option<String>,
}

/// The aggregate root for a single post in a thread.
#[derive(Debug)]
pub struct Post {
    id: Uuid,
    version: i64,
    state: PostState,
    journal: EventJournal<PostEvent>,
}

impl Post {
    /// Writes a new post, recording `PostCreated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the content is blank.
    pub fn create(
        post_id: Uuid,
        thread_id: Uuid,
        content: &str,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let content = validated_content(content)?.to_owned();
        let mut post = Self {
            id: post_id,
            version: 0,
            state: PostState {
                tenant_id: ctx.tenant_id,
                thread_id,
                author_id: ctx.actor_id,
                content: content.clone(),
                status: PostStatus::Active,
                deletion_reason: None,
            },
            journal: EventJournal::new(),
        };
        post.record(
            ctx,
            clock,
            PostEventKind::Created(PostCreated {
                post_id,
                thread_id,
                author_id: ctx.actor_id,
                content,
            }),
        );
        Ok(post)
    }

    /// The current content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// The thread this post replies to.
    #[must_use]
    pub fn thread_id(&self) -> Uuid {
        self.state.thread_id
    }

    /// The user who wrote the post.
    #[must_use]
    pub fn author_id(&self) -> Uuid {
        self.state.author_id
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> PostStatus {
        self.state.status
    }

    /// Replaces the content, recording `PostContentEdited` unless the new
    /// content equals the current content.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the post is deleted, or
    /// `DomainError::Validation` if the new content is blank.
    pub fn edit_content(
        &mut self,
        new_content: &str,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let new_content = validated_content(new_content)?;
        if new_content == self.state.content {
            return Ok(());
        }

        let old_content = std::mem::replace(&mut self.state.content, new_content.to_owned());
        self.record(
            ctx,
            clock,
            PostEventKind::ContentEdited(PostContentEdited {
                post_id: self.id,
                old_content,
                new_content: new_content.to_owned(),
                edited_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    /// Soft-deletes the post, recording `PostDeleted`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the post is already deleted.
    pub fn delete(
        &mut self,
        reason: &str,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state.status == PostStatus::Deleted {
            return Err(DomainError::InvalidState(format!(
                "post {} is already deleted",
                self.id
            )));
        }

        self.state.status = PostStatus::Deleted;
        self.state.deletion_reason = Some(reason.to_owned());
        self.record(
            ctx,
            clock,
            PostEventKind::Deleted(PostDeleted {
                post_id: self.id,
                reason: reason.to_owned(),
                deleted_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.state.status == PostStatus::Deleted {
            return Err(DomainError::InvalidState(format!(
                "post {} is deleted",
                self.id
            )));
        }
        Ok(())
    }

    fn record(&mut self, ctx: &RequestContext, clock: &dyn Clock, kind: PostEventKind) {
        let event = DomainEvent::new(self.id, self.state.tenant_id, ctx, clock, kind);
        self.journal.record(event);
    }
}

impl AggregateRoot for Post {
    type Kind = PostEventKind;
    const AGGREGATE_TYPE: &'static str = "post";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Uuid {
        self.state.tenant_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn snapshot(&self) -> Result<serde_json::Value, DomainError> {
        encode_state(&self.state)
    }

    fn restore(record: AggregateRecord) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.aggregate_id,
            version: record.version,
            state: decode_state(&record, Self::AGGREGATE_TYPE)?,
            journal: EventJournal::new(),
        })
    }

    fn drain_events(&mut self) -> Vec<PostEvent> {
        self.journal.drain()
    }

    fn requeue_events(&mut self, events: Vec<PostEvent>) {
        self.journal.requeue(events);
    }

    fn mark_saved(&mut self, version: i64) {
        self.version = version;
    }
}
