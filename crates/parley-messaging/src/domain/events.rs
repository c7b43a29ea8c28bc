//! Domain events for the Messaging context.

use parley_core::event::{DomainEvent, EventKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tag for [`PrivateThreadStarted`].
pub const PRIVATE_THREAD_STARTED_EVENT_TYPE: &str = "messaging.private_thread_started";
/// Event type tag for [`ParticipantAdded`].
pub const PARTICIPANT_ADDED_EVENT_TYPE: &str = "messaging.participant_added";
/// Event type tag for [`ParticipantLeft`].
pub const PARTICIPANT_LEFT_EVENT_TYPE: &str = "messaging.participant_left";
/// Event type tag for [`MessagePosted`].
pub const MESSAGE_POSTED_EVENT_TYPE: &str = "messaging.message_posted";

/// Emitted when a private conversation is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateThreadStarted {
    /// The private thread identifier.
    pub private_thread_id: Uuid,
    /// Conversation subject.
    pub subject: String,
    /// Initial members, starter first.
    pub participants: Vec<Uuid>,
    /// The member who started it.
    pub started_by: Uuid,
}

/// Emitted when a member invites someone new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAdded {
    /// The private thread identifier.
    pub private_thread_id: Uuid,
    /// The new member.
    pub participant_id: Uuid,
    /// The member who invited them.
    pub added_by: Uuid,
}

/// Emitted when a member leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantLeft {
    /// The private thread identifier.
    pub private_thread_id: Uuid,
    /// The departing member.
    pub participant_id: Uuid,
}

/// Emitted when a member posts a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePosted {
    /// The private thread identifier.
    pub private_thread_id: Uuid,
    /// Caller-supplied message identifier.
    pub message_id: Uuid,
    /// The author.
    pub author_id: Uuid,
    /// Message body.
    pub body: String,
}

/// Event payload variants for the `PrivateThread` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivateThreadEventKind {
    /// The conversation has started.
    Started(PrivateThreadStarted),
    /// A member has been added.
    ParticipantAdded(ParticipantAdded),
    /// A member has left.
    ParticipantLeft(ParticipantLeft),
    /// A message has been posted.
    MessagePosted(MessagePosted),
}

impl EventKind for PrivateThreadEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Started(_) => PRIVATE_THREAD_STARTED_EVENT_TYPE,
            Self::ParticipantAdded(_) => PARTICIPANT_ADDED_EVENT_TYPE,
            Self::ParticipantLeft(_) => PARTICIPANT_LEFT_EVENT_TYPE,
            Self::MessagePosted(_) => MESSAGE_POSTED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for private threads.
pub type PrivateThreadEvent = DomainEvent<PrivateThreadEventKind>;
