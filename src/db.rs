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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;

use crate::error::Fallible;
use crate::error::fail;
use crate::session::SessionSnapshot;
use crate::stats::DailyStat;
use crate::stats::advance_stat;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::date::Date;
use crate::types::review::ReviewRecord;
use crate::types::review::SessionId;
use crate::types::timestamp::Timestamp;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// Add a new card to the database.
    pub fn add_card(
        &self,
        deck_name: &str,
        front: &str,
        back: &str,
        added_at: Timestamp,
    ) -> Fallible<CardId> {
        let conn = self.acquire();
        let sql = "insert into cards (deck_name, front, back, added_at) values (?, ?, ?, ?) returning card_id;";
        let card_id: CardId =
            conn.query_row(sql, (deck_name, front, back, added_at), |row| row.get(0))?;
        log::debug!("Added card {card_id} to deck '{deck_name}'");
        Ok(card_id)
    }

    /// Get a card by its identifier.
    pub fn get_card(&self, card_id: CardId) -> Fallible<Card> {
        let conn = self.acquire();
        let sql = "select card_id, deck_name, front, back, mastery_level, eligible_at, review_count from cards where card_id = ?;";
        let card = conn.query_row(sql, [card_id], read_card)?;
        Ok(card)
    }

    /// Fetch the cards of a deck, or of the whole collection, in insertion
    /// order. Selection and ordering for a session is done by the session
    /// builder, not here.
    pub fn get_cards(&self, deck_name: Option<&str>) -> Fallible<Vec<Card>> {
        let conn = self.acquire();
        let mut cards = Vec::new();
        match deck_name {
            Some(deck_name) => {
                let sql = "select card_id, deck_name, front, back, mastery_level, eligible_at, review_count from cards where deck_name = ? order by card_id;";
                let mut stmt = conn.prepare(sql)?;
                let mut rows = stmt.query([deck_name])?;
                while let Some(row) = rows.next()? {
                    cards.push(read_card(row)?);
                }
            }
            None => {
                let sql = "select card_id, deck_name, front, back, mastery_level, eligible_at, review_count from cards order by card_id;";
                let mut stmt = conn.prepare(sql)?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    cards.push(read_card(row)?);
                }
            }
        }
        Ok(cards)
    }

    pub fn card_count(&self) -> Fallible<usize> {
        let conn = self.acquire();
        let count: i64 =
            conn.query_row("select count(*) from cards;", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// The number of cards at each mastery level, indexed by level.
    pub fn mastery_distribution(&self) -> Fallible<[u32; 6]> {
        let conn = self.acquire();
        let mut distribution = [0u32; 6];
        let sql = "select mastery_level, count(*) from cards group by mastery_level;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let level: u8 = row.get(0)?;
            let count: u32 = row.get(1)?;
            if let Some(slot) = distribution.get_mut(level as usize) {
                *slot = count;
            }
        }
        Ok(distribution)
    }

    pub fn total_review_count(&self) -> Fallible<usize> {
        let conn = self.acquire();
        let count: i64 =
            conn.query_row("select count(*) from reviews;", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Insert a session snapshot, returning its assigned identifier.
    pub fn insert_session(&self, snapshot: &SessionSnapshot) -> Fallible<SessionId> {
        let conn = self.acquire();
        let sql = "insert into sessions (deck_name, started_at, completed_at, cursor, known_count, again_count, later_count, replayed, direction, primary_queue, deferred_queue) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) returning session_id;";
        let session_id: SessionId = conn.query_row(
            sql,
            (
                &snapshot.deck_name,
                snapshot.started_at,
                snapshot.completed_at,
                snapshot.cursor as i64,
                snapshot.known_count,
                snapshot.again_count,
                snapshot.later_count,
                snapshot.replayed,
                snapshot.direction,
                serde_json::to_string(&snapshot.primary)?,
                serde_json::to_string(&snapshot.deferred)?,
            ),
            |row| row.get(0),
        )?;
        log::debug!("Started session {session_id}");
        Ok(session_id)
    }

    /// The most recent incomplete session snapshot for a grouping, used to
    /// resume an interrupted session instead of building a fresh one.
    pub fn latest_open_session(&self, deck_name: Option<&str>) -> Fallible<Option<SessionSnapshot>> {
        let conn = self.acquire();
        let columns = "session_id, deck_name, started_at, completed_at, cursor, known_count, again_count, later_count, replayed, direction, primary_queue, deferred_queue";
        match deck_name {
            Some(deck_name) => {
                let sql = format!(
                    "select {columns} from sessions where completed_at is null and deck_name = ? order by started_at desc limit 1;"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query([deck_name])?;
                match rows.next()? {
                    Some(row) => Ok(Some(read_snapshot(row)?)),
                    None => Ok(None),
                }
            }
            None => {
                let sql = format!(
                    "select {columns} from sessions where completed_at is null and deck_name is null order by started_at desc limit 1;"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query([])?;
                match rows.next()? {
                    Some(row) => Ok(Some(read_snapshot(row)?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Abandon a session: mark it completed without touching its counters,
    /// so it stops matching `latest_open_session`. The review log is left
    /// intact.
    pub fn abandon_session(&self, session_id: SessionId, now: Timestamp) -> Fallible<()> {
        log::debug!("Abandoning session {session_id}");
        let conn = self.acquire();
        let sql = "update sessions set completed_at = ? where session_id = ?;";
        conn.execute(sql, (now, session_id))?;
        Ok(())
    }

    /// Record one evaluation as a single atomic unit: insert the review
    /// record, apply its mastery side-effect to the card, and overwrite the
    /// session snapshot. A crash between the three writes can never leave
    /// the review log and the card state inconsistent.
    pub fn record_review(
        &self,
        record: &ReviewRecord,
        snapshot: &SessionSnapshot,
    ) -> Fallible<()> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        insert_review(&tx, record)?;
        update_card_mastery(&tx, record)?;
        update_session_snapshot(&tx, snapshot)?;
        tx.commit()?;
        Ok(())
    }

    /// Fold a completed session into the day's statistics, in one
    /// transaction. Returns the row as written.
    pub fn record_daily_study(&self, date: Date, studied_delta: u32) -> Fallible<DailyStat> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        let existing = daily_stat_for(&tx, date)?;
        let previous = latest_stat_before(&tx, date)?;
        let stat = advance_stat(existing.clone(), previous, date, studied_delta);
        match existing {
            Some(_) => {
                let sql = "update daily_stats set studied_count = ?, streak = ? where date = ?;";
                tx.execute(sql, (stat.studied_count, stat.streak, stat.date))?;
            }
            None => {
                let sql =
                    "insert into daily_stats (date, studied_count, streak) values (?, ?, ?);";
                tx.execute(sql, (stat.date, stat.studied_count, stat.streak))?;
            }
        }
        tx.commit()?;
        Ok(stat)
    }

    pub fn daily_stat(&self, date: Date) -> Fallible<Option<DailyStat>> {
        let conn = self.acquire();
        daily_stat_for(&conn, date)
    }

    pub fn today_studied_count(&self, today: Date) -> Fallible<u32> {
        let conn = self.acquire();
        let stat = daily_stat_for(&conn, today)?;
        Ok(stat.map(|stat| stat.studied_count).unwrap_or(0))
    }

    /// The streak as of `today`: the latest row's streak if it is dated
    /// today or yesterday (a streak survives until a full day is missed),
    /// zero otherwise.
    pub fn current_streak(&self, today: Date) -> Fallible<u32> {
        let conn = self.acquire();
        let sql = "select date, studied_count, streak from daily_stats order by date desc limit 1;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => {
                let stat = read_daily_stat(row)?;
                if stat.date == today || stat.date.succ() == Some(today) {
                    Ok(stat.streak)
                } else {
                    Ok(0)
                }
            }
            None => Ok(0),
        }
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn read_card(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        deck_name: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        mastery_level: row.get(4)?,
        eligible_at: row.get(5)?,
        review_count: row.get(6)?,
    })
}

fn read_snapshot(row: &Row) -> Fallible<SessionSnapshot> {
    let primary_queue: String = row.get(10)?;
    let deferred_queue: String = row.get(11)?;
    Ok(SessionSnapshot {
        session_id: row.get(0)?,
        deck_name: row.get(1)?,
        started_at: row.get(2)?,
        completed_at: row.get(3)?,
        cursor: row.get::<_, i64>(4)? as usize,
        known_count: row.get(5)?,
        again_count: row.get(6)?,
        later_count: row.get(7)?,
        replayed: row.get(8)?,
        direction: row.get(9)?,
        primary: serde_json::from_str(&primary_queue)?,
        deferred: serde_json::from_str(&deferred_queue)?,
    })
}

fn read_daily_stat(row: &Row) -> rusqlite::Result<DailyStat> {
    Ok(DailyStat {
        date: row.get(0)?,
        studied_count: row.get(1)?,
        streak: row.get(2)?,
    })
}

fn insert_review(tx: &Transaction, record: &ReviewRecord) -> Fallible<()> {
    let sql = "insert into reviews (session_id, card_id, reviewed_at, outcome, old_level, new_level, eligible_at) values (?, ?, ?, ?, ?, ?, ?);";
    tx.execute(
        sql,
        (
            record.session_id,
            record.card_id,
            record.reviewed_at,
            record.outcome,
            record.old_level,
            record.new_level,
            record.eligible_at,
        ),
    )?;
    Ok(())
}

fn update_card_mastery(tx: &Transaction, record: &ReviewRecord) -> Fallible<()> {
    let sql = "update cards set mastery_level = ?, eligible_at = ?, review_count = review_count + 1 where card_id = ?;";
    let updated = tx.execute(sql, (record.new_level, record.eligible_at, record.card_id))?;
    if updated != 1 {
        // Rolls back the review insert.
        return fail(format!("no card with id {}", record.card_id));
    }
    Ok(())
}

fn update_session_snapshot(tx: &Transaction, snapshot: &SessionSnapshot) -> Fallible<()> {
    let sql = "update sessions set completed_at = ?, cursor = ?, known_count = ?, again_count = ?, later_count = ?, replayed = ?, deferred_queue = ? where session_id = ?;";
    tx.execute(
        sql,
        (
            snapshot.completed_at,
            snapshot.cursor as i64,
            snapshot.known_count,
            snapshot.again_count,
            snapshot.later_count,
            snapshot.replayed,
            serde_json::to_string(&snapshot.deferred)?,
            snapshot.session_id,
        ),
    )?;
    Ok(())
}

fn daily_stat_for(conn: &Connection, date: Date) -> Fallible<Option<DailyStat>> {
    let sql = "select date, studied_count, streak from daily_stats where date = ?;";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([date])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_daily_stat(row)?)),
        None => Ok(None),
    }
}

fn latest_stat_before(conn: &Connection, date: Date) -> Fallible<Option<DailyStat>> {
    let sql = "select date, studied_count, streak from daily_stats where date < ? order by date desc limit 1;";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([date])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_daily_stat(row)?)),
        None => Ok(None),
    }
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::NaiveDate;

    use super::*;
    use crate::scheduler::schedule;
    use crate::session::Direction;
    use crate::session::Session;
    use crate::types::outcome::ReviewOutcome;

    fn open_database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leitbox.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();
        (dir, db)
    }

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_schema_probe_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leitbox.db");
        let _ = Database::new(path.to_str().unwrap()).unwrap();
        // Reopening must not re-run the schema.
        let db = Database::new(path.to_str().unwrap()).unwrap();
        assert_eq!(db.card_count().unwrap(), 0);
    }

    #[test]
    fn test_add_and_get_card() {
        let (_dir, db) = open_database();
        let id = db
            .add_card("default", "2 + 2", "4", Timestamp::now())
            .unwrap();
        let card = db.get_card(id).unwrap();
        assert_eq!(card.front, "2 + 2");
        assert_eq!(card.back, "4");
        assert_eq!(card.mastery_level, 0);
        assert_eq!(card.eligible_at, None);
        assert_eq!(card.review_count, 0);
    }

    #[test]
    fn test_get_cards_filters_by_deck() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        db.add_card("greek", "alpha", "α", now).unwrap();
        db.add_card("greek", "beta", "β", now).unwrap();
        db.add_card("chemistry", "H", "hydrogen", now).unwrap();
        assert_eq!(db.get_cards(Some("greek")).unwrap().len(), 2);
        assert_eq!(db.get_cards(None).unwrap().len(), 3);
        assert_eq!(db.get_cards(Some("derp")).unwrap().len(), 0);
    }

    #[test]
    fn test_record_review_updates_all_three() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        let card_id = db.add_card("default", "Q", "A", now).unwrap();
        let card = db.get_card(card_id).unwrap();

        let mut session =
            Session::build(None, &[card.clone()], 10, Direction::FrontToBack, now).unwrap();
        session.set_id(db.insert_session(&session.snapshot()).unwrap());

        session.reveal();
        let evaluation = session.evaluate(ReviewOutcome::Known).unwrap();
        let sched = schedule(card.mastery_level, ReviewOutcome::Known, now);
        let mut next = session.clone();
        next.apply(&evaluation, now);
        let record = ReviewRecord {
            session_id: next.id(),
            card_id,
            reviewed_at: now,
            outcome: ReviewOutcome::Known,
            old_level: card.mastery_level,
            new_level: sched.level,
            eligible_at: sched.eligible_at,
        };
        db.record_review(&record, &next.snapshot()).unwrap();

        let card = db.get_card(card_id).unwrap();
        assert_eq!(card.mastery_level, 1);
        assert_eq!(card.eligible_at, Some(now + Duration::hours(1)));
        assert_eq!(card.review_count, 1);
        assert_eq!(db.total_review_count().unwrap(), 1);
        // The session completed with this evaluation, so there is nothing
        // left to resume.
        assert!(db.latest_open_session(None).unwrap().is_none());
    }

    #[test]
    fn test_record_review_for_missing_card_rolls_back() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        let card_id = db.add_card("default", "Q", "A", now).unwrap();
        let card = db.get_card(card_id).unwrap();
        let mut session =
            Session::build(None, &[card], 10, Direction::FrontToBack, now).unwrap();
        session.set_id(db.insert_session(&session.snapshot()).unwrap());

        let record = ReviewRecord {
            session_id: session.id(),
            card_id: CardId::new(999),
            reviewed_at: now,
            outcome: ReviewOutcome::Known,
            old_level: 0,
            new_level: 1,
            eligible_at: now,
        };
        let result = db.record_review(&record, &session.snapshot());
        assert!(result.is_err());
        // The review insert must have been rolled back with it.
        assert_eq!(db.total_review_count().unwrap(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        let a = db.add_card("default", "Q1", "A1", now).unwrap();
        let b = db.add_card("default", "Q2", "A2", now).unwrap();
        let cards = vec![db.get_card(a).unwrap(), db.get_card(b).unwrap()];

        let mut session =
            Session::build(None, &cards, 10, Direction::BackToFront, now).unwrap();
        session.set_id(db.insert_session(&session.snapshot()).unwrap());
        session.reveal();
        let evaluation = session.evaluate(ReviewOutcome::Later).unwrap();
        session.apply(&evaluation, now);
        let sched = schedule(0, ReviewOutcome::Later, now);
        let record = ReviewRecord {
            session_id: session.id(),
            card_id: a,
            reviewed_at: now,
            outcome: ReviewOutcome::Later,
            old_level: 0,
            new_level: sched.level,
            eligible_at: sched.eligible_at,
        };
        db.record_review(&record, &session.snapshot()).unwrap();

        let snapshot = db.latest_open_session(None).unwrap().unwrap();
        assert_eq!(snapshot.session_id, session.id());
        assert_eq!(snapshot.cursor, 1);
        assert_eq!(snapshot.later_count, 1);
        assert_eq!(snapshot.primary, vec![a, b]);
        assert_eq!(snapshot.deferred, vec![a]);
        assert_eq!(snapshot.direction, Direction::BackToFront);

        let resumed = Session::resume(snapshot);
        assert_eq!(resumed.current_card(), Some(b));
    }

    #[test]
    fn test_latest_open_session_matches_grouping() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        let id = db.add_card("greek", "alpha", "α", now).unwrap();
        let cards = vec![db.get_card(id).unwrap()];
        let mut session = Session::build(
            Some("greek".to_string()),
            &cards,
            10,
            Direction::FrontToBack,
            now,
        )
        .unwrap();
        session.set_id(db.insert_session(&session.snapshot()).unwrap());

        assert!(db.latest_open_session(Some("greek")).unwrap().is_some());
        assert!(db.latest_open_session(Some("chemistry")).unwrap().is_none());
        assert!(db.latest_open_session(None).unwrap().is_none());
    }

    #[test]
    fn test_abandon_session() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        let id = db.add_card("default", "Q", "A", now).unwrap();
        let cards = vec![db.get_card(id).unwrap()];
        let mut session =
            Session::build(None, &cards, 10, Direction::FrontToBack, now).unwrap();
        session.set_id(db.insert_session(&session.snapshot()).unwrap());

        db.abandon_session(session.id(), now).unwrap();
        assert!(db.latest_open_session(None).unwrap().is_none());
    }

    #[test]
    fn test_record_daily_study() {
        let (_dir, db) = open_database();
        let day_one = date(2025, 6, 1);
        let stat = db.record_daily_study(day_one, 10).unwrap();
        assert_eq!(stat.studied_count, 10);
        assert_eq!(stat.streak, 1);

        // A second session the same day only bumps the count.
        let stat = db.record_daily_study(day_one, 5).unwrap();
        assert_eq!(stat.studied_count, 15);
        assert_eq!(stat.streak, 1);

        // The next day extends the streak.
        let stat = db.record_daily_study(date(2025, 6, 2), 3).unwrap();
        assert_eq!(stat.studied_count, 3);
        assert_eq!(stat.streak, 2);

        // A gap resets it.
        let stat = db.record_daily_study(date(2025, 6, 5), 1).unwrap();
        assert_eq!(stat.streak, 1);

        assert_eq!(
            db.daily_stat(day_one).unwrap(),
            Some(DailyStat {
                date: day_one,
                studied_count: 15,
                streak: 1,
            })
        );
    }

    #[test]
    fn test_current_streak() {
        let (_dir, db) = open_database();
        assert_eq!(db.current_streak(date(2025, 6, 1)).unwrap(), 0);
        db.record_daily_study(date(2025, 6, 1), 10).unwrap();
        db.record_daily_study(date(2025, 6, 2), 10).unwrap();
        // Same day, and the morning after: the streak holds.
        assert_eq!(db.current_streak(date(2025, 6, 2)).unwrap(), 2);
        assert_eq!(db.current_streak(date(2025, 6, 3)).unwrap(), 2);
        // A full missed day breaks it.
        assert_eq!(db.current_streak(date(2025, 6, 4)).unwrap(), 0);
    }

    #[test]
    fn test_mastery_distribution() {
        let (_dir, db) = open_database();
        let now = Timestamp::now();
        let a = db.add_card("default", "Q1", "A1", now).unwrap();
        db.add_card("default", "Q2", "A2", now).unwrap();
        let cards = vec![db.get_card(a).unwrap()];
        let mut session =
            Session::build(None, &cards, 1, Direction::FrontToBack, now).unwrap();
        session.set_id(db.insert_session(&session.snapshot()).unwrap());
        session.reveal();
        let evaluation = session.evaluate(ReviewOutcome::Known).unwrap();
        let sched = schedule(0, ReviewOutcome::Known, now);
        let mut next = session.clone();
        next.apply(&evaluation, now);
        let record = ReviewRecord {
            session_id: next.id(),
            card_id: a,
            reviewed_at: now,
            outcome: ReviewOutcome::Known,
            old_level: 0,
            new_level: sched.level,
            eligible_at: sched.eligible_at,
        };
        db.record_review(&record, &next.snapshot()).unwrap();

        assert_eq!(db.mastery_distribution().unwrap(), [1, 1, 0, 0, 0, 0]);
    }
}
