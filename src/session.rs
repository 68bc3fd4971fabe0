// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::VecDeque;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::outcome::ReviewOutcome;
use crate::types::review::SessionId;
use crate::types::timestamp::Timestamp;

/// Which side of the card is used as the prompt.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    FrontToBack,
    BackToFront,
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::FrontToBack => "forward",
            Direction::BackToFront => "reverse",
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "forward" => Ok(Direction::FrontToBack),
            "reverse" => Ok(Direction::BackToFront),
            _ => fail(format!("Invalid direction: {}", value)),
        }
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str().to_string()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        Direction::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A planned evaluation of the current card. Produced by
/// `Session::evaluate`, committed by `Session::apply`. The split lets the
/// caller run the persistence transaction in between: if the write fails,
/// the session is simply not advanced and the same evaluation can be
/// retried.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Evaluation {
    pub card_id: CardId,
    pub outcome: ReviewOutcome,
    /// True when the card came off the deferred queue.
    pub replay: bool,
}

/// The persisted form of a session, overwritten after every evaluation and
/// used to rebuild an interrupted session.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub deck_name: Option<String>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub cursor: usize,
    pub known_count: u32,
    pub again_count: u32,
    pub later_count: u32,
    pub replayed: u32,
    pub direction: Direction,
    pub primary: Vec<CardId>,
    pub deferred: Vec<CardId>,
}

/// The state of one study session.
///
/// The working set is split into two queues: the primary queue, fixed when
/// the session is built, and a deferred queue fed by `Later` evaluations.
/// The cursor walks the primary queue; once it reaches the end, cards are
/// drawn from the front of the deferred queue. A deferred card gets exactly
/// one extra attempt: evaluating it pops it and it is never re-appended,
/// even if it is marked `Later` again.
#[derive(Clone, Debug)]
pub struct Session {
    id: SessionId,
    deck_name: Option<String>,
    primary: Vec<CardId>,
    deferred: VecDeque<CardId>,
    cursor: usize,
    revealed: bool,
    known_count: u32,
    again_count: u32,
    later_count: u32,
    replayed: u32,
    direction: Direction,
    started_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl Session {
    /// Build a session from a card set. Cards that have never been studied
    /// come first, in the order given; cards whose eligibility timestamp has
    /// passed follow, soonest-eligible first. The queue is truncated to
    /// `limit`. Fails if no card qualifies.
    pub fn build(
        deck_name: Option<String>,
        cards: &[Card],
        limit: usize,
        direction: Direction,
        now: Timestamp,
    ) -> Fallible<Session> {
        let new_cards = cards.iter().filter(|card| card.eligible_at.is_none());
        let mut due: Vec<&Card> = cards
            .iter()
            .filter(|card| card.eligible_at.is_some() && card.is_eligible(now))
            .collect();
        due.sort_by_key(|card| card.eligible_at);
        let primary: Vec<CardId> = new_cards
            .chain(due)
            .map(|card| card.id)
            .take(limit)
            .collect();
        if primary.is_empty() {
            return fail("no cards are eligible for study.");
        }
        Ok(Session {
            id: 0,
            deck_name,
            primary,
            deferred: VecDeque::new(),
            cursor: 0,
            revealed: false,
            known_count: 0,
            again_count: 0,
            later_count: 0,
            replayed: 0,
            direction,
            started_at: now,
            completed_at: None,
        })
    }

    /// Rebuild a session from a persisted snapshot. The answer always starts
    /// hidden: reveal state is deliberately not persisted.
    pub fn resume(snapshot: SessionSnapshot) -> Session {
        Session {
            id: snapshot.session_id,
            deck_name: snapshot.deck_name,
            primary: snapshot.primary,
            deferred: snapshot.deferred.into_iter().collect(),
            cursor: snapshot.cursor,
            revealed: false,
            known_count: snapshot.known_count,
            again_count: snapshot.again_count,
            later_count: snapshot.later_count,
            replayed: snapshot.replayed,
            direction: snapshot.direction,
            started_at: snapshot.started_at,
            completed_at: snapshot.completed_at,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            deck_name: self.deck_name.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            cursor: self.cursor,
            known_count: self.known_count,
            again_count: self.again_count,
            later_count: self.later_count,
            replayed: self.replayed,
            direction: self.direction,
            primary: self.primary.clone(),
            deferred: self.deferred.iter().copied().collect(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn set_id(&mut self, id: SessionId) {
        self.id = id;
    }

    pub fn deck_name(&self) -> Option<&str> {
        self.deck_name.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn known_count(&self) -> u32 {
        self.known_count
    }

    pub fn again_count(&self) -> u32 {
        self.again_count
    }

    pub fn later_count(&self) -> u32 {
        self.later_count
    }

    /// The number of cards in the primary queue.
    pub fn card_count(&self) -> usize {
        self.primary.len()
    }

    /// The number of cards mastered in this session.
    pub fn mastered_count(&self) -> u32 {
        self.known_count
    }

    /// The card currently being shown, if any.
    pub fn current_card(&self) -> Option<CardId> {
        if self.completed_at.is_some() {
            return None;
        }
        if self.cursor < self.primary.len() {
            Some(self.primary[self.cursor])
        } else {
            self.deferred.front().copied()
        }
    }

    /// Is the current card the last one the session will show?
    pub fn is_last_card(&self) -> bool {
        self.remaining() == 1
    }

    /// Evaluations completed and total evaluations the session will run.
    /// The total grows when a card is deferred.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.cursor + self.replayed as usize;
        (done, done + self.remaining())
    }

    fn remaining(&self) -> usize {
        (self.primary.len() - self.cursor) + self.deferred.len()
    }

    /// Show the answer for the current card. Idempotent: revealing an
    /// already-revealed card, or a completed session, does nothing. Double
    /// taps must not corrupt state.
    pub fn reveal(&mut self) {
        if self.completed_at.is_none() && !self.revealed {
            self.revealed = true;
        }
    }

    /// Plan the evaluation of the current card. Returns `None` while the
    /// answer is hidden or the session is complete; duplicate input events
    /// are ignored rather than surfaced as errors.
    pub fn evaluate(&self, outcome: ReviewOutcome) -> Option<Evaluation> {
        if !self.revealed {
            log::debug!("Ignoring evaluation: answer is not revealed");
            return None;
        }
        let card_id = self.current_card()?;
        Some(Evaluation {
            card_id,
            outcome,
            replay: self.cursor >= self.primary.len(),
        })
    }

    /// Commit a planned evaluation: update the counters, feed the deferred
    /// queue, advance to the next card, and mark completion when both queues
    /// are exhausted.
    ///
    /// A first-pass `Later` appends the card to the deferred queue. A replay
    /// moves the card's tally from `later_count` to the final outcome's
    /// counter, so the three counters always sum to the primary queue
    /// length once the session completes; a replay marked `Later` again
    /// stays where it is and is not re-queued.
    pub fn apply(&mut self, evaluation: &Evaluation, now: Timestamp) {
        if evaluation.replay {
            self.deferred.pop_front();
            self.replayed += 1;
            match evaluation.outcome {
                ReviewOutcome::Known => {
                    self.known_count += 1;
                    self.later_count = self.later_count.saturating_sub(1);
                }
                ReviewOutcome::Again => {
                    self.again_count += 1;
                    self.later_count = self.later_count.saturating_sub(1);
                }
                ReviewOutcome::Later => {}
            }
        } else {
            self.cursor += 1;
            match evaluation.outcome {
                ReviewOutcome::Known => self.known_count += 1,
                ReviewOutcome::Again => self.again_count += 1,
                ReviewOutcome::Later => {
                    self.later_count += 1;
                    self.deferred.push_back(evaluation.card_id);
                }
            }
        }
        self.revealed = false;
        if self.cursor == self.primary.len() && self.deferred.is_empty() {
            self.completed_at = Some(now);
        }
    }
}
