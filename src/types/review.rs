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

use crate::types::card::CardId;
use crate::types::outcome::ReviewOutcome;
use crate::types::timestamp::Timestamp;

pub type SessionId = i64;

/// One row of the immutable review log. A review record exists if and only
/// if the matching mastery update was applied to the card; the two are
/// written in the same transaction.
#[derive(Clone, Debug)]
pub struct ReviewRecord {
    pub session_id: SessionId,
    pub card_id: CardId,
    pub reviewed_at: Timestamp,
    pub outcome: ReviewOutcome,
    /// The card's mastery level before this review.
    pub old_level: u8,
    /// The card's mastery level after this review.
    pub new_level: u8,
    /// The next-eligible timestamp assigned by this review.
    pub eligible_at: Timestamp,
}
