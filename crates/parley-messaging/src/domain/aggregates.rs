//! Aggregate roots for the Messaging context.

use chrono::{DateTime, Utc};
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
    MessagePosted, ParticipantAdded, ParticipantLeft, PrivateThreadEvent, PrivateThreadEventKind,
    PrivateThreadStarted,
};

/// Largest membership a private thread may reach.
pub const MAX_PARTICIPANTS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrivateThreadState {
    tenant_id: Uuid,
    started_by: Uuid,
    subject: String,
    participants: Vec<Uuid>,
    message_count: u64,
    last_message_at: Option<DateTime<Utc>>,
}

/// The aggregate root for a private conversation.
#[derive(Debug)]
pub struct PrivateThread {
    id: Uuid,
    version: i64,
    state: PrivateThreadState,
    journal: EventJournal<PrivateThreadEvent>,
}

impl PrivateThread {
    /// Starts a conversation between the acting user and `others`,
    /// recording `PrivateThreadStarted`. Repeated ids are collapsed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the subject is blank, fewer than
    /// two distinct members result, or the membership limit is exceeded.
    pub fn start(
        private_thread_id: Uuid,
        subject: &str,
        others: &[Uuid],
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(DomainError::Validation(
                "private thread subject must not be blank".into(),
            ));
        }

        let mut participants = vec![ctx.actor_id];
        for other in others {
            if !participants.contains(other) {
                participants.push(*other);
            }
        }
        if participants.len() < 2 {
            return Err(DomainError::Validation(
                "a private thread needs at least two distinct participants".into(),
            ));
        }
        if participants.len() > MAX_PARTICIPANTS {
            return Err(DomainError::Validation(format!(
                "a private thread may have at most {MAX_PARTICIPANTS} participants"
            )));
        }

        let mut thread = Self {
            id: private_thread_id,
            version: 0,
            state: PrivateThreadState {
                tenant_id: ctx.tenant_id,
                started_by: ctx.actor_id,
                subject: subject.to_owned(),
                participants: participants.clone(),
                message_count: 0,
                last_message_at: None,
            },
            journal: EventJournal::new(),
        };
        thread.record(
            ctx,
            clock,
            PrivateThreadEventKind::Started(PrivateThreadStarted {
                private_thread_id,
                subject: subject.to_owned(),
                participants,
                started_by: ctx.actor_id,
            }),
        );
        Ok(thread)
    }

    /// Conversation subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.state.subject
    }

    /// Current members.
    #[must_use]
    pub fn participants(&self) -> &[Uuid] {
        &self.state.participants
    }

    /// Whether `user_id` is currently a member.
    #[must_use]
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.state.participants.contains(&user_id)
    }

    /// Number of messages posted so far.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.state.message_count
    }

    /// When the latest message was posted.
    #[must_use]
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.state.last_message_at
    }

    fn require_member(&self, user_id: Uuid) -> Result<(), DomainError> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "user {user_id} is not a participant of private thread {}",
                self.id
            )))
        }
    }

    /// Adds `participant_id`, recording `ParticipantAdded`. Adding an
    /// existing member records nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the actor is not a member or the
    /// membership limit would be exceeded.
    pub fn add_participant(
        &mut self,
        participant_id: Uuid,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.require_member(ctx.actor_id)?;
        if self.is_participant(participant_id) {
            return Ok(());
        }
        if self.state.participants.len() >= MAX_PARTICIPANTS {
            return Err(DomainError::Validation(format!(
                "private thread {} is full",
                self.id
            )));
        }

        self.state.participants.push(participant_id);
        self.record(
            ctx,
            clock,
            PrivateThreadEventKind::ParticipantAdded(ParticipantAdded {
                private_thread_id: self.id,
                participant_id,
                added_by: ctx.actor_id,
            }),
        );
        Ok(())
    }

    /// Removes the acting user, recording `ParticipantLeft`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the actor is not a member.
    pub fn leave(&mut self, ctx: &RequestContext, clock: &dyn Clock) -> Result<(), DomainError> {
        self.require_member(ctx.actor_id)?;

        self.state.participants.retain(|id| *id != ctx.actor_id);
        self.record(
            ctx,
            clock,
            PrivateThreadEventKind::ParticipantLeft(ParticipantLeft {
                private_thread_id: self.id,
                participant_id: ctx.actor_id,
            }),
        );
        Ok(())
    }

    /// Posts a message as the acting user, recording `MessagePosted`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the actor is not a member or the
    /// body is blank.
    pub fn post_message(
        &mut self,
        message_id: Uuid,
        body: &str,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.require_member(ctx.actor_id)?;
        if body.trim().is_empty() {
            return Err(DomainError::Validation("message body must not be blank".into()));
        }

        self.state.message_count += 1;
        self.state.last_message_at = Some(clock.now());
        self.record(
            ctx,
            clock,
            PrivateThreadEventKind::MessagePosted(MessagePosted {
                private_thread_id: self.id,
                message_id,
                author_id: ctx.actor_id,
                body: body.to_owned(),
            }),
        );
        Ok(())
    }

    fn record(&mut self, ctx: &RequestContext, clock: &dyn Clock, kind: PrivateThreadEventKind) {
        let event = DomainEvent::new(self.id, self.state.tenant_id, ctx, clock, kind);
        self.journal.record(event);
    }
}

impl AggregateRoot for PrivateThread {
    type Kind = PrivateThreadEventKind;
    const AGGREGATE_TYPE: &'static str = "private_thread";

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

    fn drain_events(&mut self) -> Vec<PrivateThreadEvent> {
        self.journal.drain()
    }

    fn requeue_events(&mut self, events: Vec<PrivateThreadEvent>) {
        self.journal.requeue(events);
    }

    fn mark_saved(&mut self, version: i64) {
        self.version = version;
    }
}
