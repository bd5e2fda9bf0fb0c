//! Balance, point ledger and streak rows
//!
//! Plain statement helpers over a connection or an open transaction. They
//! never open transactions themselves; atomicity is the caller's
//! responsibility (see `RewardDb::write_tx`).

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::models::{Balance, LeaderboardEntry, PointTransaction};
use super::streaks::StreakState;
use super::time_bucket::{day_bucket, parse_day_bucket};

pub(crate) fn load_balance(
    conn: &Connection,
    user_id: &str,
) -> rusqlite::Result<Option<Balance>> {
    conn.query_row(
        r#"SELECT user_id, points, lifetime_xp, level, updated_at
           FROM user_balances WHERE user_id = ?1"#,
        [user_id],
        |r| {
            Ok(Balance {
                user_id: r.get(0)?,
                points: r.get(1)?,
                lifetime_xp: r.get(2)?,
                level: r.get(3)?,
                updated_at: r.get(4)?,
            })
        },
    )
    .optional()
}

/// Upsert lifetime XP and the level derived from it
pub(crate) fn write_xp(
    conn: &Connection,
    user_id: &str,
    lifetime_xp: i64,
    level: u32,
    now: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"INSERT INTO user_balances (user_id, points, lifetime_xp, level, updated_at)
           VALUES (?1, 0, ?2, ?3, ?4)
           ON CONFLICT(user_id) DO UPDATE SET
               lifetime_xp = ?2, level = ?3, updated_at = ?4"#,
        params![user_id, lifetime_xp, level, now],
    )?;
    Ok(())
}

/// Upsert-increment the spendable points balance
pub(crate) fn increment_points(
    conn: &Connection,
    user_id: &str,
    delta: i64,
    now: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"INSERT INTO user_balances (user_id, points, lifetime_xp, level, updated_at)
           VALUES (?1, ?2, 0, 1, ?3)
           ON CONFLICT(user_id) DO UPDATE SET
               points = points + ?2, updated_at = ?3"#,
        params![user_id, delta, now],
    )?;
    Ok(())
}

/// Append a ledger row and return its id
pub(crate) fn append_transaction(
    conn: &Connection,
    user_id: &str,
    delta: i64,
    reason: &str,
    source_event_id: Option<&str>,
    now: i64,
) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        r#"INSERT INTO point_transactions (id, user_id, delta, reason, source_event_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        params![id, user_id, delta, reason, source_event_id, now],
    )?;
    Ok(id)
}

/// Most recent ledger rows for a user, newest first
pub(crate) fn list_transactions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<PointTransaction>> {
    let mut stmt = conn.prepare(
        r#"SELECT id, user_id, delta, reason, source_event_id, created_at
           FROM point_transactions
           WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2"#,
    )?;
    let rows = stmt.query_map(params![user_id, limit as i64], |r| {
        Ok(PointTransaction {
            id: r.get(0)?,
            user_id: r.get(1)?,
            delta: r.get(2)?,
            reason: r.get(3)?,
            source_event_id: r.get(4)?,
            created_at: r.get(5)?,
        })
    })?;
    rows.collect()
}

/// Sum and count of ledger deltas for a user
pub(crate) fn ledger_totals(conn: &Connection, user_id: &str) -> rusqlite::Result<(i64, u64)> {
    conn.query_row(
        "SELECT COALESCE(SUM(delta), 0), COUNT(*) FROM point_transactions WHERE user_id = ?1",
        [user_id],
        |r| Ok((r.get(0)?, r.get::<_, i64>(1)? as u64)),
    )
}

/// Every user id that has a balance row or a ledger row
pub(crate) fn known_user_ids(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"SELECT user_id FROM user_balances
           UNION
           SELECT user_id FROM point_transactions
           ORDER BY user_id"#,
    )?;
    let ids = stmt.query_map([], |r| r.get(0))?;
    ids.collect()
}

pub(crate) fn leaderboard(
    conn: &Connection,
    limit: usize,
) -> rusqlite::Result<Vec<LeaderboardEntry>> {
    let mut stmt = conn.prepare(
        r#"SELECT user_id, level, lifetime_xp, points FROM user_balances
           ORDER BY lifetime_xp DESC, user_id ASC
           LIMIT ?1"#,
    )?;
    let rows = stmt.query_map([limit as i64], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, u32>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, i64>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for (i, row) in rows.enumerate() {
        let (user_id, level, lifetime_xp, points) = row?;
        entries.push(LeaderboardEntry {
            rank: i + 1,
            user_id,
            level,
            lifetime_xp,
            points,
        });
    }
    Ok(entries)
}

pub(crate) fn load_streak(
    conn: &Connection,
    user_id: &str,
) -> rusqlite::Result<Option<StreakState>> {
    conn.query_row(
        r#"SELECT current_streak, longest_streak, last_activity_date, total_days_active
           FROM user_streaks WHERE user_id = ?1"#,
        [user_id],
        |r| {
            Ok(StreakState {
                current_streak: r.get(0)?,
                longest_streak: r.get(1)?,
                last_activity_date: r
                    .get::<_, Option<String>>(2)?
                    .map(|raw| {
                        parse_day_bucket(&raw).ok_or_else(|| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                Type::Text,
                                format!("invalid streak date {raw:?}").into(),
                            )
                        })
                    })
                    .transpose()?,
                total_days_active: r.get(3)?,
            })
        },
    )
    .optional()
}

pub(crate) fn save_streak(
    conn: &Connection,
    user_id: &str,
    state: &StreakState,
    now: i64,
) -> rusqlite::Result<()> {
    let last_day = state.last_activity_date.map(day_bucket);
    conn.execute(
        r#"INSERT INTO user_streaks
               (user_id, current_streak, longest_streak, last_activity_date,
                total_days_active, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(user_id) DO UPDATE SET
               current_streak = ?2, longest_streak = ?3, last_activity_date = ?4,
               total_days_active = ?5, updated_at = ?6"#,
        params![
            user_id,
            state.current_streak,
            state.longest_streak,
            last_day,
            state.total_days_active,
            now,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE user_balances (user_id TEXT PRIMARY KEY, points INTEGER NOT NULL DEFAULT 0,
                lifetime_xp INTEGER NOT NULL DEFAULT 0, level INTEGER NOT NULL DEFAULT 1,
                updated_at INTEGER NOT NULL);
            CREATE TABLE point_transactions (id TEXT PRIMARY KEY, user_id TEXT NOT NULL,
                delta INTEGER NOT NULL, reason TEXT NOT NULL, source_event_id TEXT,
                created_at INTEGER NOT NULL);
            CREATE TABLE user_streaks (user_id TEXT PRIMARY KEY,
                current_streak INTEGER NOT NULL DEFAULT 0, longest_streak INTEGER NOT NULL DEFAULT 0, last_activity_date TEXT,
                total_days_active INTEGER NOT NULL DEFAULT 0, updated_at INTEGER NOT NULL);
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_points_and_xp_upserts_share_one_row() {
        let conn = memory_conn();
        assert!(load_balance(&conn, "u1").unwrap().is_none());

        write_xp(&conn, "u1", 300, 2, 1).unwrap();
        increment_points(&conn, "u1", 40, 2).unwrap();
        increment_points(&conn, "u1", 2, 3).unwrap();

        let balance = load_balance(&conn, "u1").unwrap().unwrap();
        assert_eq!(balance.points, 42);
        assert_eq!(balance.lifetime_xp, 300);
        assert_eq!(balance.level, 2);
        assert_eq!(balance.updated_at, 3);
    }

    #[test]
    fn test_ledger_totals_and_listing() {
        let conn = memory_conn();
        append_transaction(&conn, "u1", 10, "daily_login", None, 1).unwrap();
        append_transaction(&conn, "u1", 50, "lesson_complete", Some("e2"), 2).unwrap();
        append_transaction(&conn, "u2", 7, "test_solved", None, 3).unwrap();

        assert_eq!(ledger_totals(&conn, "u1").unwrap(), (60, 2));
        assert_eq!(ledger_totals(&conn, "nobody").unwrap(), (0, 0));

        let rows = list_transactions(&conn, "u1", 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reason, "lesson_complete");
        assert_eq!(rows[0].source_event_id.as_deref(), Some("e2"));

        assert_eq!(known_user_ids(&conn).unwrap(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_streak_row_round_trip() {
        let conn = memory_conn();
        let state = StreakState {
            current_streak: 4,
            longest_streak: 9,
            last_activity_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 31),
            total_days_active: 20,
        };
        save_streak(&conn, "u1", &state, 1).unwrap();
        assert_eq!(load_streak(&conn, "u1").unwrap(), Some(state));
        assert_eq!(load_streak(&conn, "u2").unwrap(), None);
    }

    #[test]
    fn test_unparseable_streak_date_is_an_error() {
        let conn = memory_conn();
        conn.execute(
            r#"INSERT INTO user_streaks
                   (user_id, current_streak, longest_streak, last_activity_date,
                    total_days_active, updated_at)
               VALUES ('u1', 5, 5, '2024/07/05', 5, 1)"#,
            [],
        )
        .unwrap();

        assert!(matches!(
            load_streak(&conn, "u1"),
            Err(rusqlite::Error::FromSqlConversionFailure(2, Type::Text, _))
        ));
    }
}
