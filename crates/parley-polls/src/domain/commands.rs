//! Commands for the Polls context.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Command to attach a poll to a thread.
#[derive(Debug, Clone)]
pub struct CreatePoll {
    /// Identifier for the new poll.
    pub poll_id: Uuid,
    /// The thread the poll belongs to.
    pub thread_id: Uuid,
    /// The question asked.
    pub question: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Optional voting deadline.
    pub closes_at: Option<DateTime<Utc>>,
}

/// Command to vote in a poll.
#[derive(Debug, Clone)]
pub struct CastVote {
    /// The poll voted in.
    pub poll_id: Uuid,
    /// Index of the chosen option.
    pub option_index: usize,
}

/// Command to close a poll.
#[derive(Debug, Clone)]
pub struct ClosePoll {
    /// The poll to close.
    pub poll_id: Uuid,
}
