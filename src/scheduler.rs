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

use chrono::Duration;

use crate::types::outcome::ReviewOutcome;
use crate::types::timestamp::Timestamp;

/// The highest mastery level a card can reach.
pub const MAX_LEVEL: u8 = 5;

/// How long a card waits before becoming eligible again, by mastery level.
/// This table is the single source of truth for review timing. Levels
/// outside `0..=MAX_LEVEL` return `None`; callers use that only for
/// diagnostics.
pub fn interval_for(level: u8) -> Option<Duration> {
    match level {
        0 => Some(Duration::zero()),
        1 => Some(Duration::hours(1)),
        2 => Some(Duration::hours(8)),
        3 => Some(Duration::days(1)),
        4 => Some(Duration::days(3)),
        5 => Some(Duration::days(7)),
        _ => None,
    }
}

/// The result of scheduling a review: the card's new mastery level and the
/// earliest time it may be shown again.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Schedule {
    pub level: u8,
    pub eligible_at: Timestamp,
}

/// Map a review outcome to the card's next mastery level and eligibility
/// timestamp. Pure and total: no I/O, deterministic given its inputs.
pub fn schedule(level: u8, outcome: ReviewOutcome, now: Timestamp) -> Schedule {
    let level = level.min(MAX_LEVEL);
    let level = match outcome {
        ReviewOutcome::Known => (level + 1).min(MAX_LEVEL),
        ReviewOutcome::Again => level.saturating_sub(1),
        ReviewOutcome::Later => level,
    };
    let interval = interval_for(level).unwrap_or_else(Duration::zero);
    Schedule {
        level,
        eligible_at: now + interval,
    }
}

/// Like `schedule`, but for callers holding a raw outcome code. An
/// unrecognized code leaves the mastery level unchanged instead of failing.
pub fn schedule_code(level: u8, code: i64, now: Timestamp) -> Schedule {
    match ReviewOutcome::from_code(code) {
        Some(outcome) => schedule(level, outcome, now),
        None => {
            log::debug!("Ignoring unknown outcome code {code}");
            schedule(level, ReviewOutcome::Later, now)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    fn now() -> Timestamp {
        Timestamp::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_interval_table() {
        assert_eq!(interval_for(0), Some(Duration::zero()));
        assert_eq!(interval_for(1), Some(Duration::hours(1)));
        assert_eq!(interval_for(2), Some(Duration::hours(8)));
        assert_eq!(interval_for(3), Some(Duration::days(1)));
        assert_eq!(interval_for(4), Some(Duration::days(3)));
        assert_eq!(interval_for(5), Some(Duration::days(7)));
        assert_eq!(interval_for(6), None);
        assert_eq!(interval_for(u8::MAX), None);
    }

    #[test]
    fn test_known_increments_up_to_max() {
        for level in 0..=MAX_LEVEL {
            let result = schedule(level, ReviewOutcome::Known, now());
            assert_eq!(result.level, (level + 1).min(MAX_LEVEL));
        }
    }

    #[test]
    fn test_again_decrements_down_to_zero() {
        for level in 0..=MAX_LEVEL {
            let result = schedule(level, ReviewOutcome::Again, now());
            assert_eq!(result.level, level.saturating_sub(1));
        }
    }

    #[test]
    fn test_later_leaves_level_unchanged() {
        for level in 0..=MAX_LEVEL {
            let result = schedule(level, ReviewOutcome::Later, now());
            assert_eq!(result.level, level);
        }
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(schedule(MAX_LEVEL, ReviewOutcome::Known, now()).level, 5);
        assert_eq!(schedule(0, ReviewOutcome::Again, now()).level, 0);
    }

    #[test]
    fn test_eligible_at_matches_interval_table() {
        for level in 0..=MAX_LEVEL {
            for outcome in [
                ReviewOutcome::Again,
                ReviewOutcome::Later,
                ReviewOutcome::Known,
            ] {
                let result = schedule(level, outcome, now());
                let interval = interval_for(result.level).unwrap();
                assert_eq!(result.eligible_at, now() + interval);
            }
        }
    }

    #[test]
    fn test_known_at_level_two_waits_one_day() {
        let result = schedule(2, ReviewOutcome::Known, now());
        assert_eq!(result.level, 3);
        assert_eq!(result.eligible_at, now() + Duration::days(1));
    }

    #[test]
    fn test_again_at_level_zero_is_immediate() {
        let result = schedule(0, ReviewOutcome::Again, now());
        assert_eq!(result.level, 0);
        assert_eq!(result.eligible_at, now());
    }

    #[test]
    fn test_unknown_code_leaves_level_unchanged() {
        for code in [-1, 3, 4, 99, i64::MAX] {
            for level in 0..=MAX_LEVEL {
                let result = schedule_code(level, code, now());
                assert_eq!(result.level, level);
            }
        }
    }

    #[test]
    fn test_known_codes_match_schedule() {
        let result = schedule_code(2, 2, now());
        assert_eq!(result, schedule(2, ReviewOutcome::Known, now()));
    }

    #[test]
    fn test_out_of_range_level_is_clamped() {
        let result = schedule(200, ReviewOutcome::Later, now());
        assert_eq!(result.level, MAX_LEVEL);
    }
}
