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

use serde::Serialize;

use crate::collection::Collection;
use crate::error::Fallible;
use crate::types::date::Date;
use crate::types::timestamp::Timestamp;

/// One row of per-day study statistics.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DailyStat {
    pub date: Date,
    /// Cards studied on this date, cumulative across sessions.
    pub studied_count: u32,
    /// The consecutive-day streak as of this date.
    pub streak: u32,
}

/// Fold one completed session into the day's statistics. This is the only
/// place the streak is computed.
///
/// `existing` is the row for `date`, if one exists; `previous` is the most
/// recent row before `date`. A repeat session on the same day only bumps the
/// studied count: the streak is decided once, on the first completion of the
/// day. A fresh day extends the streak when the previous row is exactly one
/// calendar day earlier, and resets it to 1 otherwise.
pub fn advance_stat(
    existing: Option<DailyStat>,
    previous: Option<DailyStat>,
    date: Date,
    studied_delta: u32,
) -> DailyStat {
    match existing {
        Some(mut stat) => {
            stat.studied_count += studied_delta;
            stat
        }
        None => {
            let streak = match previous {
                Some(prev) if prev.date.succ() == Some(date) => prev.streak + 1,
                _ => 1,
            };
            DailyStat {
                date,
                studied_count: studied_delta,
                streak,
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    card_count: usize,
    /// Cards per mastery level, indexed by level.
    mastery_distribution: [u32; 6],
    today_studied_count: u32,
    current_streak: u32,
    total_review_count: usize,
}

/// Print collection statistics as JSON.
pub fn print_stats(directory: Option<String>) -> Fallible<()> {
    let collection = Collection::new(directory)?;
    let today = Timestamp::now().local_date();
    let stats = Stats {
        card_count: collection.db.card_count()?,
        mastery_distribution: collection.db.mastery_distribution()?,
        today_studied_count: collection.db.today_studied_count(today)?,
        current_streak: collection.db.current_streak(today)?,
        total_review_count: collection.db.total_review_count()?,
    };
    let stats_json = serde_json::to_string_pretty(&stats)?;
    println!("{}", stats_json);
    Ok(())
}
