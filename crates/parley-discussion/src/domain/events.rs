//! Domain events for the Discussion context.

use parley_core::event::{DomainEvent, EventKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tag for [`ThreadCreated`].
pub const THREAD_CREATED_EVENT_TYPE: &str = "discussion.thread_created";
/// Event type tag for [`ThreadTitleChanged`].
pub const THREAD_TITLE_CHANGED_EVENT_TYPE: &str = "discussion.thread_title_changed";
/// Event type tag for [`ThreadMoved`].
pub const THREAD_MOVED_EVENT_TYPE: &str = "discussion.thread_moved";
/// Event type tag for [`ThreadPinChanged`].
pub const THREAD_PIN_CHANGED_EVENT_TYPE: &str = "discussion.thread_pin_changed";
/// Event type tag for [`ThreadClosed`].
pub const THREAD_CLOSED_EVENT_TYPE: &str = "discussion.thread_closed";
/// Event type tag for [`PostCreated`].
pub const POST_CREATED_EVENT_TYPE: &str = "discussion.post_created";
/// Event type tag for [`PostContentEdited`].
pub const POST_CONTENT_EDITED_EVENT_TYPE: &str = "discussion.post_content_edited";
/// Event type tag for [`PostDeleted`].
pub const POST_DELETED_EVENT_TYPE: &str = "discussion.post_deleted";

/// Emitted when a thread is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCreated {
    /// The thread identifier.
    pub thread_id: Uuid,
    /// The category the thread is filed under.
    pub category_id: Uuid,
    /// The user who opened the thread.
    pub author_id: Uuid,
    /// The thread title.
    pub title: String,
}

/// Emitted when a thread's title changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadTitleChanged {
    /// The thread identifier.
    pub thread_id: Uuid,
    /// Title before the change.
    pub old_title: String,
    /// Title after the change.
    pub new_title: String,
    /// The user who changed it.
    pub changed_by: Uuid,
}

/// Emitted when a thread moves to another category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMoved {
    /// The thread identifier.
    pub thread_id: Uuid,
    /// Previous category.
    pub from_category_id: Uuid,
    /// New category.
    pub to_category_id: Uuid,
    /// The user who moved it.
    pub moved_by: Uuid,
}

/// Emitted when a thread is pinned or unpinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPinChanged {
    /// The thread identifier.
    pub thread_id: Uuid,
    /// Whether the thread is now pinned.
    pub pinned: bool,
    /// The user who changed it.
    pub changed_by: Uuid,
}

/// Emitted when a thread is closed to new replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadClosed {
    /// The thread identifier.
    pub thread_id: Uuid,
    /// The user who closed it.
    pub closed_by: Uuid,
}

/// Emitted when a post is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreated {
    /// The post identifier.
    pub post_id: Uuid,
    /// The thread the post replies to.
    pub thread_id: Uuid,
    /// The user who wrote it.
    pub author_id: Uuid,
    /// The post body.
    pub content: String,
}

/// Emitted when a post's content is edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContentEdited {
    /// The post identifier.
    pub post_id: Uuid,
    /// Content before the edit.
    pub old_content: String,
    /// Content after the edit.
    pub new_content: String,
    /// The user who edited it.
    pub edited_by: Uuid,
}

/// Emitted when a post is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeleted {
    /// The post identifier.
    pub post_id: Uuid,
    /// Why it was deleted.
    pub reason: String,
    /// The user who deleted it.
    pub deleted_by: Uuid,
}

/// Event payload variants for the Thread aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadEventKind {
    /// A thread has been opened.
    Created(ThreadCreated),
    /// The title has changed.
    TitleChanged(ThreadTitleChanged),
    /// The thread moved category.
    Moved(ThreadMoved),
    /// The pin flag flipped.
    PinChanged(ThreadPinChanged),
    /// The thread has been closed.
    Closed(ThreadClosed),
}

impl EventKind for ThreadEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            ThreadEventKind::Created(_) => THREAD_CREATED_EVENT_TYPE,
            ThreadEventKind::TitleChanged(_) => THREAD_TITLE_CHANGED_EVENT_TYPE,
            ThreadEventKind::Moved(_) => THREAD_MOVED_EVENT_TYPE,
            ThreadEventKind::PinChanged(_) => THREAD_PIN_CHANGED_EVENT_TYPE,
            ThreadEventKind::Closed(_) => THREAD_CLOSED_EVENT_TYPE,
        }
    }
}

/// Event payload variants for the Post aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostEventKind {
    /// A post has been written.
    Created(PostCreated),
    /// The post's content has been edited.
    ContentEdited(PostContentEdited),
    /// The post has been deleted.
    Deleted(PostDeleted),
}

impl EventKind for PostEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            PostEventKind::Created(_) => POST_CREATED_EVENT_TYPE,
            PostEventKind::ContentEdited(_) => POST_CONTENT_EDITED_EVENT_TYPE,
            PostEventKind::Deleted(_) => POST_DELETED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for threads.
pub type ThreadEvent = DomainEvent<ThreadEventKind>;

/// Domain event envelope for posts.
pub type PostEvent = DomainEvent<PostEventKind>;
