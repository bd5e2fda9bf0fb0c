//! Append-only event ledger
//!
//! Events are the provenance anchors for ledger rows. Recording enforces the
//! deduplication key, and applying an event marks it so it can only ever
//! be consumed once.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use uuid::Uuid;

use super::error::{Result, RewardError};
use super::events::{Event, RewardRequest};

/// Insert a new event, rejecting it if `dedup_key` is already taken
pub(crate) fn insert_event(
    conn: &Connection,
    user_id: &str,
    event_type: &str,
    payload: &Value,
    dedup_key: Option<&str>,
    now: i64,
) -> Result<Event> {
    if let Some(key) = dedup_key {
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM reward_events WHERE dedup_key = ?1",
                [key],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(existing_event_id) = existing {
            return Err(RewardError::DuplicateEvent {
                dedup_key: key.to_string(),
                existing_event_id,
            });
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        r#"INSERT INTO reward_events (id, user_id, event_type, payload, dedup_key, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        params![id, user_id, event_type, payload.to_string(), dedup_key, now],
    )?;

    Ok(Event {
        id,
        user_id: user_id.to_string(),
        event_type: event_type.to_string(),
        payload: payload.clone(),
        dedup_key: dedup_key.map(str::to_string),
        created_at: now,
        applied_at: None,
    })
}

/// Mark an event consumed by the rules engine on behalf of `request`.
///
/// Fails if the event is missing, belongs to another user, was already
/// applied, or was recorded with a different type or payload than the
/// request carries.
pub(crate) fn mark_applied(
    conn: &Connection,
    event_id: &str,
    request: &RewardRequest,
    now: i64,
) -> Result<()> {
    let event = match load_event(conn, event_id)? {
        Some(event) if event.user_id == request.user_id => event,
        _ => {
            return Err(RewardError::UnknownSourceEvent {
                event_id: event_id.to_string(),
            });
        }
    };

    if event.applied_at.is_some() {
        return Err(RewardError::EventAlreadyApplied {
            event_id: event_id.to_string(),
        });
    }
    if event.event_type != request.event_type {
        return Err(RewardError::SourceEventMismatch {
            event_id: event_id.to_string(),
            reason: format!(
                "recorded as {}, requested as {}",
                event.event_type, request.event_type
            ),
        });
    }
    if event.payload != request.payload {
        return Err(RewardError::SourceEventMismatch {
            event_id: event_id.to_string(),
            reason: "payload differs from the recorded event".to_string(),
        });
    }

    conn.execute(
        "UPDATE reward_events SET applied_at = ?1 WHERE id = ?2",
        params![now, event_id],
    )?;
    Ok(())
}

pub(crate) fn load_event(conn: &Connection, event_id: &str) -> rusqlite::Result<Option<Event>> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_EVENT),
        [event_id],
        row_to_event,
    )
    .optional()
}

/// Most recent events for a user, newest first
pub(crate) fn list_events(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        SELECT_EVENT
    ))?;
    let rows = stmt.query_map(params![user_id, limit as i64], row_to_event)?;
    rows.collect()
}

const SELECT_EVENT: &str =
    "SELECT id, user_id, event_type, payload, dedup_key, created_at, applied_at FROM reward_events";

fn row_to_event(r: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let raw: String = r.get(3)?;
    let payload = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(Event {
        id: r.get(0)?,
        user_id: r.get(1)?,
        event_type: r.get(2)?,
        payload,
        dedup_key: r.get(4)?,
        created_at: r.get(5)?,
        applied_at: r.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"CREATE TABLE reward_events (id TEXT PRIMARY KEY, user_id TEXT NOT NULL,
                   event_type TEXT NOT NULL, payload TEXT NOT NULL, dedup_key TEXT UNIQUE,
                   created_at INTEGER NOT NULL, applied_at INTEGER);"#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let conn = memory_conn();
        let first = insert_event(&conn, "u1", "daily_login", &json!({}), Some("k1"), 1).unwrap();

        let err = insert_event(&conn, "u1", "daily_login", &json!({}), Some("k1"), 2).unwrap_err();
        match err {
            RewardError::DuplicateEvent {
                dedup_key,
                existing_event_id,
            } => {
                assert_eq!(dedup_key, "k1");
                assert_eq!(existing_event_id, first.id);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Events without a key never collide
        insert_event(&conn, "u1", "test_solved", &json!({}), None, 3).unwrap();
        insert_event(&conn, "u1", "test_solved", &json!({}), None, 4).unwrap();
        assert_eq!(list_events(&conn, "u1", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_mark_applied_once() {
        let conn = memory_conn();
        let payload = json!({"perfectScore": true});
        let event = insert_event(&conn, "u1", "lesson_complete", &payload, None, 1).unwrap();
        let request = RewardRequest::from(&event);

        mark_applied(&conn, &event.id, &request, 5).unwrap();
        let stored = load_event(&conn, &event.id).unwrap().unwrap();
        assert_eq!(stored.applied_at, Some(5));
        assert_eq!(stored.payload, json!({"perfectScore": true}));

        assert!(matches!(
            mark_applied(&conn, &event.id, &request, 6),
            Err(RewardError::EventAlreadyApplied { .. })
        ));
        assert!(matches!(
            mark_applied(&conn, "missing", &request, 6),
            Err(RewardError::UnknownSourceEvent { .. })
        ));
    }

    #[test]
    fn test_mark_applied_checks_owner() {
        let conn = memory_conn();
        let event = insert_event(&conn, "u1", "job_application", &json!({}), None, 1).unwrap();
        let request = RewardRequest::new("u2", "job_application", json!({}));
        assert!(matches!(
            mark_applied(&conn, &event.id, &request, 2),
            Err(RewardError::UnknownSourceEvent { .. })
        ));
    }

    #[test]
    fn test_mark_applied_rejects_other_type() {
        let conn = memory_conn();
        let event =
            insert_event(&conn, "u1", "post_created", &json!({"postId": "p1"}), None, 1).unwrap();
        let mut request = RewardRequest::from(&event);
        request.event_type = "hackathon_winner".to_string();

        assert!(matches!(
            mark_applied(&conn, &event.id, &request, 2),
            Err(RewardError::SourceEventMismatch { .. })
        ));
        let stored = load_event(&conn, &event.id).unwrap().unwrap();
        assert_eq!(stored.applied_at, None);
    }

    #[test]
    fn test_mark_applied_rejects_other_payload() {
        let conn = memory_conn();
        let recorded = json!({"quizAttemptId": "a1", "firstAttempt": false});
        let event = insert_event(&conn, "u1", "test_solved", &recorded, None, 1).unwrap();
        let mut request = RewardRequest::from(&event);
        request.payload = json!({"quizAttemptId": "a1", "firstAttempt": true});

        assert!(matches!(
            mark_applied(&conn, &event.id, &request, 2),
            Err(RewardError::SourceEventMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupt_payload_is_reported() {
        let conn = memory_conn();
        conn.execute(
            r#"INSERT INTO reward_events (id, user_id, event_type, payload, created_at)
               VALUES ('e1', 'u1', 'post_created', '{not json', 1)"#,
            [],
        )
        .unwrap();

        assert!(matches!(
            load_event(&conn, "e1"),
            Err(rusqlite::Error::FromSqlConversionFailure(3, Type::Text, _))
        ));
        assert!(list_events(&conn, "u1", 10).is_err());
    }
}
