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

use axum::Form;
use axum::extract::State;
use axum::response::Redirect;
use serde::Deserialize;

use crate::drill::state::MutableState;
use crate::drill::state::ServerState;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::scheduler::schedule;
use crate::types::outcome::ReviewOutcome;
use crate::types::review::ReviewRecord;
use crate::types::timestamp::Timestamp;

#[derive(Debug, Deserialize)]
enum Action {
    Reveal,
    Again,
    Later,
    Known,
}

#[derive(Deserialize)]
pub struct FormData {
    action: Action,
}

pub async fn post_handler(
    State(state): State<ServerState>,
    Form(form): Form<FormData>,
) -> Redirect {
    match action_handler(state, form.action) {
        Ok(_) => {}
        Err(e) => {
            log::error!("{e}");
        }
    }
    Redirect::to("/")
}

fn action_handler(state: ServerState, action: Action) -> Fallible<()> {
    let mut mutable = state.mutable.lock().unwrap();
    match action {
        Action::Reveal => {
            mutable.session.reveal();
            Ok(())
        }
        Action::Again => evaluate(&mut mutable, ReviewOutcome::Again),
        Action::Later => evaluate(&mut mutable, ReviewOutcome::Later),
        Action::Known => evaluate(&mut mutable, ReviewOutcome::Known),
    }
}

fn evaluate(mutable: &mut MutableState, outcome: ReviewOutcome) -> Fallible<()> {
    // Evaluations while the answer is hidden, or after completion, are
    // duplicate input events. Ignore them.
    let Some(evaluation) = mutable.session.evaluate(outcome) else {
        return Ok(());
    };
    let now = Timestamp::now();
    let card = mutable
        .cards
        .get(&evaluation.card_id)
        .cloned()
        .ok_or_else(|| ErrorReport::new("card missing from working set"))?;
    let sched = schedule(card.mastery_level, outcome, now);

    let mut next = mutable.session.clone();
    next.apply(&evaluation, now);
    let record = ReviewRecord {
        session_id: next.id(),
        card_id: card.id,
        reviewed_at: now,
        outcome,
        old_level: card.mastery_level,
        new_level: sched.level,
        eligible_at: sched.eligible_at,
    };
    // The review record, the mastery update and the session snapshot are
    // one transaction. The in-memory session advances only after it
    // commits, so a failed write leaves the user on the same card to retry.
    mutable.db.record_review(&record, &next.snapshot())?;

    log::debug!(
        "card {} {}: level {} -> {}",
        card.id,
        outcome.as_str(),
        card.mastery_level,
        sched.level
    );
    if let Some(entry) = mutable.cards.get_mut(&evaluation.card_id) {
        entry.mastery_level = sched.level;
        entry.eligible_at = Some(sched.eligible_at);
        entry.review_count += 1;
    }
    mutable.session = next;

    if mutable.session.is_completed() {
        log::debug!("Session completed");
        let studied = mutable.session.card_count() as u32;
        let stat = mutable.db.record_daily_study(now.local_date(), studied)?;
        mutable.streak = Some(stat.streak);
    }
    Ok(())
}
