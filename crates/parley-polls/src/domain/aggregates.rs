//! Aggregate roots for the Polls context.

use std::collections::HashSet;

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

use super::events::{PollClosed, PollCreated, PollEvent, PollEventKind, VoteCast};

/// Most options a poll may offer.
pub const MAX_OPTIONS: usize = 20;

/// Lifecycle of a poll. `Closed` is terminal; an open poll past its
/// deadline behaves as closed for voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    /// Accepting votes until `closes_at`, if set.
    Open,
    /// No longer accepting votes.
    Closed,
}

/// One recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// The voter.
    pub voter_id: Uuid,
    /// Index of the chosen option.
    pub option_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PollState {
    tenant_id: Uuid,
    thread_id: Uuid,
    created_by: Uuid,
    question: String,
    options: Vec<String>,
    votes: Vec<Vote>,
    closes_at: Option<DateTime<Utc>>,
    status: PollStatus,
}

/// The aggregate root for a poll.
#[derive(Debug)]
pub struct Poll {
    id: Uuid,
    version: i64,
    state: PollState,
    journal: EventJournal<PollEvent>,
}

fn validated_options(options: &[String]) -> Result<Vec<String>, DomainError> {
    if options.len() < 2 {
        return Err(DomainError::Validation(
            "a poll needs at least two options".into(),
        ));
    }
    if options.len() > MAX_OPTIONS {
        return Err(DomainError::Validation(format!(
            "a poll may offer at most {MAX_OPTIONS} options"
        )));
    }

    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(options.len());
    for option in options {
        let option = option.trim();
        if option.is_empty() {
            return Err(DomainError::Validation("poll options must not be blank".into()));
        }
        if !seen.insert(option.to_lowercase()) {
            return Err(DomainError::Validation(format!(
                "duplicate poll option {option:?}"
            )));
        }
        cleaned.push(option.to_owned());
    }
    Ok(cleaned)
}

impl Poll {
    /// Creates a poll, recording `PollCreated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the question is blank, the
    /// options are fewer than two, blank, duplicated or too many, or the
    /// deadline is not in the future.
    pub fn create(
        poll_id: Uuid,
        thread_id: Uuid,
        question: &str,
        options: &[String],
        closes_at: Option<DateTime<Utc>>,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DomainError::Validation("poll question must not be blank".into()));
        }
        let options = validated_options(options)?;
        if let Some(deadline) = closes_at {
            if deadline <= clock.now() {
                return Err(DomainError::Validation(
                    "poll deadline must be in the future".into(),
                ));
            }
        }

        let mut poll = Self {
            id: poll_id,
            version: 0,
            state: PollState {
                tenant_id: ctx.tenant_id,
                thread_id,
                created_by: ctx.actor_id,
                question: question.to_owned(),
                options: options.clone(),
                votes: Vec::new(),
                closes_at,
                status: PollStatus::Open,
            },
            journal: EventJournal::new(),
        };
        poll.record(
            ctx,
            clock,
            PollEventKind::Created(PollCreated {
                poll_id,
                thread_id,
                question: question.to_owned(),
                options,
                closes_at,
                created_by: ctx.actor_id,
            }),
        );
        Ok(poll)
    }

    /// The question asked.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.state.question
    }

    /// Answer options in display order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.state.options
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> PollStatus {
        self.state.status
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.state
            .closes_at
            .is_some_and(|deadline| clock.now() >= deadline)
    }

    /// Whether `voter_id` has already voted.
    #[must_use]
    pub fn has_voted(&self, voter_id: Uuid) -> bool {
        self.state.votes.iter().any(|v| v.voter_id == voter_id)
    }

    /// Vote count per option.
    #[must_use]
    pub fn tally(&self) -> Vec<u32> {
        let mut counts = vec![0_u32; self.state.options.len()];
        for vote in &self.state.votes {
            if let Some(count) = counts.get_mut(vote.option_index) {
                *count += 1;
            }
        }
        counts
    }

    /// Records the acting user's vote, recording `VoteCast`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the poll is closed or expired,
    /// or `DomainError::Validation` if the option does not exist or the
    /// actor has already voted.
    pub fn vote(
        &mut self,
        option_index: usize,
        ctx: &RequestContext,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state.status == PollStatus::Closed {
            return Err(DomainError::InvalidState(format!(
                "poll {} is closed",
                self.id
            )));
        }
        if self.is_expired(clock) {
            return Err(DomainError::InvalidState(format!(
                "poll {} has expired",
                self.id
            )));
        }
        let option = self.state.options.get(option_index).cloned().ok_or_else(|| {
            DomainError::Validation(format!(
                "poll {} has no option {option_index}",
                self.id
            ))
        })?;
        if self.has_voted(ctx.actor_id) {
            return Err(DomainError::Validation(format!(
                "user {} has already voted in poll {}",
                ctx.actor_id, self.id
            )));
        }

        self.state.votes.push(Vote {
            voter_id: ctx.actor_id,
            option_index,
        });
        self.record(
            ctx,
            clock,
            PollEventKind::VoteCast(VoteCast {
                poll_id: self.id,
                voter_id: ctx.actor_id,
                option_index,
                option,
            }),
        );
        Ok(())
    }

    /// Stops the poll accepting votes, recording `PollClosed` with the final
    /// tally. Expired polls may still be closed explicitly.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the poll is already closed.
    pub fn close(&mut self, ctx: &RequestContext, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.state.status == PollStatus::Closed {
            return Err(DomainError::InvalidState(format!(
                "poll {} is already closed",
                self.id
            )));
        }

        self.state.status = PollStatus::Closed;
        let tally = self.tally();
        self.record(
            ctx,
            clock,
            PollEventKind::Closed(PollClosed {
                poll_id: self.id,
                closed_by: ctx.actor_id,
                tally,
            }),
        );
        Ok(())
    }

    fn record(&mut self, ctx: &RequestContext, clock: &dyn Clock, kind: PollEventKind) {
        let event = DomainEvent::new(self.id, self.state.tenant_id, ctx, clock, kind);
        self.journal.record(event);
    }
}

impl AggregateRoot for Poll {
    type Kind = PollEventKind;
    const AGGREGATE_TYPE: &'static str = "poll";

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

    fn drain_events(&mut self) -> Vec<PollEvent> {
        self.journal.drain()
    }

    fn requeue_events(&mut self, events: Vec<PollEvent>) {
        self.journal.requeue(events);
    }

    fn mark_saved(&mut self, version: i64) {
        self.version = version;
    }
}
