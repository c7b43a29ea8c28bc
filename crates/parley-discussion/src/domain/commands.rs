//! Commands for the Discussion context.

use uuid::Uuid;

/// Command to open a new thread.
#[derive(Debug, Clone)]
pub struct CreateThread {
    /// Identifier for the new thread.
    pub thread_id: Uuid,
    /// Category to file it under.
    pub category_id: Uuid,
    /// Thread title.
    pub title: String,
}

/// Command to retitle a thread.
#[derive(Debug, Clone)]
pub struct ChangeThreadTitle {
    /// The thread to retitle.
    pub thread_id: Uuid,
    /// The new title.
    pub title: String,
}

/// Command to move a thread to another category.
#[derive(Debug, Clone)]
pub struct MoveThread {
    /// The thread to move.
    pub thread_id: Uuid,
    /// Destination category.
    pub category_id: Uuid,
}

/// Command to pin or unpin a thread.
#[derive(Debug, Clone)]
pub struct PinThread {
    /// The thread to update.
    pub thread_id: Uuid,
    /// Desired pin state.
    pub pinned: bool,
}

/// Command to close a thread.
#[derive(Debug, Clone)]
pub struct CloseThread {
    /// The thread to close.
    pub thread_id: Uuid,
}

/// Command to reply to a thread.
#[derive(Debug, Clone)]
pub struct CreatePost {
    /// Identifier for the new post.
    pub post_id: Uuid,
    /// The thread being replied to.
    pub thread_id: Uuid,
    /// Post body.
    pub content: String,
}

/// Command to edit a post's content.
#[derive(Debug, Clone)]
pub struct EditPost {
    /// The post to edit.
    pub post_id: Uuid,
    /// Replacement content.
    pub content: String,
}

/// Command to delete a post.
#[derive(Debug, Clone)]
pub struct DeletePost {
    /// The post to delete.
    pub post_id: Uuid,
    /// Why it is being deleted.
    pub reason: String,
}
