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

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;

use crate::error::ErrorReport;
use crate::error::fail;

/// The learner's self-reported recall result for one card presentation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReviewOutcome {
    /// The learner failed to recall the card.
    Again,
    /// The learner deferred the card for a second pass within the session.
    Later,
    /// The learner recalled the card correctly.
    Known,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            ReviewOutcome::Again => "again",
            ReviewOutcome::Later => "later",
            ReviewOutcome::Known => "known",
        }
    }

    /// Decode the integer code used by callers that still speak the old wire
    /// format. Unknown codes decode to `None`, which callers treat as a
    /// no-op.
    pub fn from_code(code: i64) -> Option<ReviewOutcome> {
        match code {
            0 => Some(ReviewOutcome::Again),
            1 => Some(ReviewOutcome::Later),
            2 => Some(ReviewOutcome::Known),
            _ => None,
        }
    }
}

impl TryFrom<String> for ReviewOutcome {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "again" => Ok(ReviewOutcome::Again),
            "later" => Ok(ReviewOutcome::Later),
            "known" => Ok(ReviewOutcome::Known),
            _ => fail(format!("Invalid review outcome: {}", value)),
        }
    }
}

impl ToSql for ReviewOutcome {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str().to_string()))
    }
}

impl FromSql for ReviewOutcome {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        ReviewOutcome::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
