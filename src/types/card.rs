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

use std::fmt::Display;
use std::fmt::Formatter;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::types::timestamp::Timestamp;

/// A card's database identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CardId(i64);

impl CardId {
    #[cfg(test)]
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl Display for CardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for CardId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for CardId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let id: i64 = FromSql::column_result(value)?;
        Ok(CardId(id))
    }
}

/// A unit of study material, owned by the database.
#[derive(Clone, Debug)]
pub struct Card {
    pub id: CardId,
    /// The name of the deck this card belongs to.
    pub deck_name: String,
    pub front: String,
    pub back: String,
    /// How well the card is known, from 0 to `MAX_LEVEL`.
    pub mastery_level: u8,
    /// The earliest time the card may be shown again. `None` means the card
    /// has never been studied and is eligible immediately.
    pub eligible_at: Option<Timestamp>,
    /// The number of times the card has been reviewed.
    pub review_count: u32,
}

impl Card {
    /// Is the card eligible for study at the given instant?
    pub fn is_eligible(&self, now: Timestamp) -> bool {
        match self.eligible_at {
            None => true,
            Some(eligible_at) => eligible_at <= now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn card(eligible_at: Option<Timestamp>) -> Card {
        Card {
            id: CardId::new(1),
            deck_name: "default".to_string(),
            front: "Q".to_string(),
            back: "A".to_string(),
            mastery_level: 0,
            eligible_at,
            review_count: 0,
        }
    }

    #[test]
    fn test_never_studied_is_eligible() {
        let now = Timestamp::now();
        assert!(card(None).is_eligible(now));
    }

    #[test]
    fn test_eligibility_boundary() {
        let now = Timestamp::now();
        assert!(card(Some(now)).is_eligible(now));
        assert!(!card(Some(now + Duration::hours(1))).is_eligible(now));
    }
}
