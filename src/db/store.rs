//! Row-level storage operations.
//!
//! Free functions over a borrowed connection so the same code runs both
//! standalone and inside a transaction (`Transaction` derefs to
//! `Connection`). Composite operations are assembled by the engine under
//! the per-user critical section.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::actions::Action;
use crate::error::{CoachError, Result};
use crate::state::{CheckIn, CheckInScores, CyclePhase, StateKey};
use crate::tracker::{PendingRecommendation, ResolutionOutcome};

/// Per-user record. `checkins_logged` drives exploration decay.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub checkins_logged: u64,
}

/// A stored daily check-in
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckInRow {
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
    pub cycle_phase: CyclePhase,
    pub scores: CheckInScores,
}

impl CheckInRow {
    /// Rebuild the check-in for re-encoding
    pub fn as_check_in(&self) -> CheckIn {
        CheckIn {
            cycle_phase: self.cycle_phase,
            recorded_at: self.recorded_at,
            sleep: Some(self.scores.sleep),
            mood: Some(self.scores.mood),
            stress: Some(self.scores.stress),
            pain: Some(self.scores.pain),
            energy: Some(self.scores.energy),
        }
    }
}

/// One learned value table entry, in export form
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QEntry {
    pub state: String,
    pub action: String,
    pub value: f64,
}

/// One applied update, in export form
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HistoryRow {
    pub state: String,
    pub action: String,
    pub value: f64,
    pub reward: f64,
    pub recorded_at: DateTime<Utc>,
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoachError::storage(format!("bad timestamp {}: {}", s, e)))
}

// ---- users ----

pub fn create_user(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (user_id, created_at) VALUES (?1, ?2)",
        params![user_id, now.to_rfc3339()],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<UserRecord>> {
    let row = conn
        .query_row(
            "SELECT user_id, created_at, checkins_logged FROM users WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((user_id, created_at, checkins_logged)) => Ok(Some(UserRecord {
            user_id,
            created_at: parse_ts(&created_at)?,
            checkins_logged: checkins_logged.max(0) as u64,
        })),
        None => Ok(None),
    }
}

/// Remove a user and everything owned by them
pub fn delete_user(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM feedback WHERE pending_id IN \
         (SELECT id FROM pending_recommendations WHERE user_id = ?1)",
        params![user_id],
    )?;
    conn.execute(
        "DELETE FROM pending_recommendations WHERE user_id = ?1",
        params![user_id],
    )?;
    conn.execute("DELETE FROM q_history WHERE user_id = ?1", params![user_id])?;
    conn.execute("DELETE FROM q_values WHERE user_id = ?1", params![user_id])?;
    conn.execute("DELETE FROM check_ins WHERE user_id = ?1", params![user_id])?;
    conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
    Ok(())
}

// ---- check-ins ----

/// Insert or overwrite the day's check-in (latest submission for a
/// calendar day wins). Bumps `checkins_logged` only for a new day.
/// Returns true if the day was new.
pub fn upsert_check_in(
    conn: &Connection,
    user_id: &str,
    check_in: &CheckIn,
    scores: &CheckInScores,
) -> Result<bool> {
    let day = check_in.recorded_at.date_naive().to_string();
    let existing: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM check_ins WHERE user_id = ?1 AND day = ?2",
            params![user_id, day],
            |row| row.get(0),
        )
        .optional()?;

    conn.execute(
        "INSERT INTO check_ins \
         (user_id, day, recorded_at, cycle_phase, sleep, mood, stress, pain, energy) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT (user_id, day) DO UPDATE SET \
         recorded_at = excluded.recorded_at, cycle_phase = excluded.cycle_phase, \
         sleep = excluded.sleep, mood = excluded.mood, stress = excluded.stress, \
         pain = excluded.pain, energy = excluded.energy",
        params![
            user_id,
            day,
            check_in.recorded_at.to_rfc3339(),
            check_in.cycle_phase.as_str(),
            scores.sleep,
            scores.mood,
            scores.stress,
            scores.pain,
            scores.energy,
        ],
    )?;

    let is_new = existing.is_none();
    if is_new {
        conn.execute(
            "UPDATE users SET checkins_logged = checkins_logged + 1 WHERE user_id = ?1",
            params![user_id],
        )?;
    }
    Ok(is_new)
}

type CheckInTuple = (String, String, String, u8, u8, u8, u8, u8);

fn check_in_from_tuple(t: CheckInTuple) -> Result<CheckInRow> {
    let (user_id, recorded_at, cycle_phase, sleep, mood, stress, pain, energy) = t;
    Ok(CheckInRow {
        user_id,
        recorded_at: parse_ts(&recorded_at)?,
        cycle_phase: cycle_phase.parse()?,
        scores: CheckInScores {
            sleep,
            mood,
            stress,
            pain,
            energy,
        },
    })
}

const CHECK_IN_COLS: &str =
    "user_id, recorded_at, cycle_phase, sleep, mood, stress, pain, energy";

fn map_check_in(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckInTuple> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

pub fn latest_check_in(conn: &Connection, user_id: &str) -> Result<Option<CheckInRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM check_ins WHERE user_id = ?1 ORDER BY day DESC LIMIT 1",
                CHECK_IN_COLS
            ),
            params![user_id],
            map_check_in,
        )
        .optional()?;
    row.map(check_in_from_tuple).transpose()
}

/// Earliest check-in on a later calendar day than `issued_at`, still
/// inside the resolution window
pub fn follow_up_check_in(
    conn: &Connection,
    user_id: &str,
    issued_at: DateTime<Utc>,
    window_hours: i64,
) -> Result<Option<CheckInRow>> {
    let issued_day = issued_at.date_naive().to_string();
    let deadline = (issued_at + chrono::Duration::hours(window_hours)).to_rfc3339();
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM check_ins \
                 WHERE user_id = ?1 AND day > ?2 AND recorded_at <= ?3 \
                 ORDER BY day ASC LIMIT 1",
                CHECK_IN_COLS
            ),
            params![user_id, issued_day, deadline],
            map_check_in,
        )
        .optional()?;
    row.map(check_in_from_tuple).transpose()
}

// ---- value table ----

/// Learned value for (user, state, action); absence is the unvisited
/// state and reads as the neutral default 0.0
pub fn q_get(conn: &Connection, user_id: &str, state: &StateKey, action: Action) -> Result<f64> {
    let value = conn
        .query_row(
            "SELECT value FROM q_values WHERE user_id = ?1 AND state = ?2 AND action = ?3",
            params![user_id, state.as_key(), action.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0.0))
}

pub fn q_set(
    conn: &Connection,
    user_id: &str,
    state: &StateKey,
    action: Action,
    value: f64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO q_values (user_id, state, action, value) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (user_id, state, action) DO UPDATE SET value = excluded.value",
        params![user_id, state.as_key(), action.as_str(), value],
    )?;
    Ok(())
}

/// Full value table for a user, ordered for stable export
pub fn q_snapshot(conn: &Connection, user_id: &str) -> Result<Vec<QEntry>> {
    let mut stmt = conn.prepare(
        "SELECT state, action, value FROM q_values WHERE user_id = ?1 ORDER BY state, action",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(QEntry {
            state: row.get(0)?,
            action: row.get(1)?,
            value: row.get(2)?,
        })
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

pub fn insert_history(
    conn: &Connection,
    user_id: &str,
    state: &StateKey,
    action: Action,
    value: f64,
    reward: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO q_history (user_id, state, action, value, reward, recorded_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            state.as_key(),
            action.as_str(),
            value,
            reward,
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

pub fn history_for_user(conn: &Connection, user_id: &str) -> Result<Vec<HistoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT state, action, value, reward, recorded_at FROM q_history \
         WHERE user_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (state, action, value, reward, recorded_at) = row?;
        entries.push(HistoryRow {
            state,
            action,
            value,
            reward,
            recorded_at: parse_ts(&recorded_at)?,
        });
    }
    Ok(entries)
}

// ---- pending recommendations ----

type PendingTuple = (
    String,
    String,
    String,
    String,
    String,
    u8,
    u8,
    String,
    bool,
    Option<String>,
    Option<String>,
);

const PENDING_COLS: &str = "id, user_id, state, action, message, energy_at_issue, \
                            mood_at_issue, issued_at, resolved, resolved_at, outcome";

fn map_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingTuple> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn pending_from_tuple(t: PendingTuple) -> Result<PendingRecommendation> {
    let (id, user_id, state, action, message, energy, mood, issued_at, resolved, resolved_at, outcome) =
        t;
    Ok(PendingRecommendation {
        id: Uuid::parse_str(&id).map_err(|e| CoachError::storage(format!("bad uuid: {}", e)))?,
        user_id,
        state: state.parse()?,
        action: action.parse()?,
        message,
        energy_at_issue: energy,
        mood_at_issue: mood,
        issued_at: parse_ts(&issued_at)?,
        resolved,
        resolved_at: resolved_at.as_deref().map(parse_ts).transpose()?,
        outcome: outcome.as_deref().map(str::parse).transpose()?,
    })
}

pub fn insert_pending(conn: &Connection, pending: &PendingRecommendation) -> Result<()> {
    conn.execute(
        "INSERT INTO pending_recommendations \
         (id, user_id, state, action, message, energy_at_issue, mood_at_issue, issued_at, resolved) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
        params![
            pending.id.to_string(),
            pending.user_id,
            pending.state.as_key(),
            pending.action.as_str(),
            pending.message,
            pending.energy_at_issue,
            pending.mood_at_issue,
            pending.issued_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn open_pending(conn: &Connection, user_id: &str) -> Result<Option<PendingRecommendation>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM pending_recommendations \
                 WHERE user_id = ?1 AND resolved = 0 ORDER BY issued_at DESC LIMIT 1",
                PENDING_COLS
            ),
            params![user_id],
            map_pending,
        )
        .optional()?;
    row.map(pending_from_tuple).transpose()
}

pub fn pending_by_id(conn: &Connection, id: Uuid) -> Result<Option<PendingRecommendation>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM pending_recommendations WHERE id = ?1",
                PENDING_COLS
            ),
            params![id.to_string()],
            map_pending,
        )
        .optional()?;
    row.map(pending_from_tuple).transpose()
}

pub fn mark_resolved(
    conn: &Connection,
    id: Uuid,
    outcome: ResolutionOutcome,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE pending_recommendations SET resolved = 1, resolved_at = ?2, outcome = ?3 \
         WHERE id = ?1 AND resolved = 0",
        params![id.to_string(), now.to_rfc3339(), outcome.as_str()],
    )?;
    Ok(())
}

/// Unresolved recommendation count, used for invariant checks
pub fn count_open_pending(conn: &Connection, user_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pending_recommendations WHERE user_id = ?1 AND resolved = 0",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

// ---- feedback ----

pub fn insert_feedback(
    conn: &Connection,
    pending_id: Uuid,
    action_taken: bool,
    rating: u8,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO feedback (pending_id, action_taken, rating, recorded_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            pending_id.to_string(),
            action_taken,
            rating,
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::state::encode;
    use chrono::TimeZone;

    fn check_in(day: u32, hour: u32) -> CheckIn {
        CheckIn {
            cycle_phase: CyclePhase::Luteal,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap(),
            sleep: Some(5),
            mood: Some(4),
            stress: Some(7),
            pain: Some(3),
            energy: Some(3),
        }
    }

    #[test]
    fn test_same_day_check_in_overwrites() {
        let db = Database::open(None::<&str>).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        db.with_conn(|conn| {
            create_user(conn, "u1", now)?;
            let morning = check_in(10, 8);
            let scores = morning.validated()?;
            assert!(upsert_check_in(conn, "u1", &morning, &scores)?);

            let mut evening = check_in(10, 19);
            evening.energy = Some(6);
            let scores = evening.validated()?;
            assert!(!upsert_check_in(conn, "u1", &evening, &scores)?);

            let latest = latest_check_in(conn, "u1")?.unwrap();
            assert_eq!(latest.scores.energy, 6);

            // Overwrites do not inflate the exploration-decay counter
            let user = get_user(conn, "u1")?.unwrap();
            assert_eq!(user.checkins_logged, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_q_get_defaults_to_zero() {
        let db = Database::open(None::<&str>).unwrap();
        db.with_conn(|conn| {
            let state = encode(&check_in(10, 8))?;
            assert_eq!(q_get(conn, "u1", &state, Action::Nap)?, 0.0);
            q_set(conn, "u1", &state, Action::Nap, 0.42)?;
            assert_eq!(q_get(conn, "u1", &state, Action::Nap)?, 0.42);
            // Another user's table is untouched
            assert_eq!(q_get(conn, "u2", &state, Action::Nap)?, 0.0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_follow_up_requires_later_day_within_window() {
        let db = Database::open(None::<&str>).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        db.with_conn(|conn| {
            create_user(conn, "u1", now)?;
            let first = check_in(10, 9);
            upsert_check_in(conn, "u1", &first, &first.validated()?)?;
            let issued_at = first.recorded_at;

            // Same day: no follow-up yet
            assert!(follow_up_check_in(conn, "u1", issued_at, 48)?.is_none());

            let next = check_in(11, 8);
            upsert_check_in(conn, "u1", &next, &next.validated()?)?;
            let follow_up = follow_up_check_in(conn, "u1", issued_at, 48)?.unwrap();
            assert_eq!(follow_up.recorded_at, next.recorded_at);

            // A tight window excludes it
            assert!(follow_up_check_in(conn, "u1", issued_at, 12)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_pending_round_trip_and_resolution() {
        let db = Database::open(None::<&str>).unwrap();
        db.with_conn(|conn| {
            let state = encode(&check_in(10, 8))?;
            let pending = PendingRecommendation::new(
                "u1",
                state,
                Action::Stretch,
                "stretch it out",
                3,
                4,
                Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap(),
            );
            insert_pending(conn, &pending)?;

            let open = open_pending(conn, "u1")?.unwrap();
            assert_eq!(open.id, pending.id);
            assert_eq!(open.action, Action::Stretch);
            assert!(!open.resolved);

            mark_resolved(conn, pending.id, ResolutionOutcome::Expired, Utc::now())?;
            assert!(open_pending(conn, "u1")?.is_none());
            let resolved = pending_by_id(conn, pending.id)?.unwrap();
            assert!(resolved.resolved);
            assert_eq!(resolved.outcome, Some(ResolutionOutcome::Expired));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_user_cascades() {
        let db = Database::open(None::<&str>).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        db.with_conn(|conn| {
            create_user(conn, "u1", now)?;
            let ci = check_in(10, 8);
            upsert_check_in(conn, "u1", &ci, &ci.validated()?)?;
            let state = encode(&ci)?;
            q_set(conn, "u1", &state, Action::Nap, 0.5)?;
            insert_history(conn, "u1", &state, Action::Nap, 0.5, 0.6, now)?;

            delete_user(conn, "u1")?;
            assert!(get_user(conn, "u1")?.is_none());
            assert!(latest_check_in(conn, "u1")?.is_none());
            assert!(q_snapshot(conn, "u1")?.is_empty());
            assert!(history_for_user(conn, "u1")?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
