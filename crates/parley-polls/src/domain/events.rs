//! Domain events for the Polls context.

use chrono::{DateTime, Utc};
use parley_core::event::{DomainEvent, EventKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tag for [`PollCreated`].
pub const POLL_CREATED_EVENT_TYPE: &str = "polls.poll_created";
/// Event type tag for [`VoteCast`].
pub const VOTE_CAST_EVENT_TYPE: &str = "polls.vote_cast";
/// Event type tag for [`PollClosed`].
pub const POLL_CLOSED_EVENT_TYPE: &str = "polls.poll_closed";

/// Emitted when a poll is attached to a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCreated {
    /// The poll identifier.
    pub poll_id: Uuid,
    /// The thread the poll belongs to.
    pub thread_id: Uuid,
    /// The question asked.
    pub question: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Voting deadline, if any.
    pub closes_at: Option<DateTime<Utc>>,
    /// The user who created it.
    pub created_by: Uuid,
}

/// Emitted when a voter picks an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCast {
    /// The poll identifier.
    pub poll_id: Uuid,
    /// The voter.
    pub voter_id: Uuid,
    /// Index of the chosen option.
    pub option_index: usize,
    /// Text of the chosen option.
    pub option: String,
}

/// Emitted when a poll stops accepting votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollClosed {
    /// The poll identifier.
    pub poll_id: Uuid,
    /// The user who closed it.
    pub closed_by: Uuid,
    /// Final vote count per option.
    pub tally: Vec<u32>,
}

/// Event payload variants for the Poll aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollEventKind {
    /// A poll has been created.
    Created(PollCreated),
    /// A vote has been cast.
    VoteCast(VoteCast),
    /// The poll has been closed.
    Closed(PollClosed),
}

impl EventKind for PollEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            PollEventKind::Created(_) => POLL_CREATED_EVENT_TYPE,
            PollEventKind::VoteCast(_) => VOTE_CAST_EVENT_TYPE,
            PollEventKind::Closed(_) => POLL_CLOSED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for polls.
pub type PollEvent = DomainEvent<PollEventKind>;
