//! Reward engine error types

use rusqlite::ErrorCode;

pub type Result<T> = std::result::Result<T, RewardError>;

#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Concurrent commit conflict persisted after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    #[error("Reward store failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error(
        "Ledger integrity violation for user {user_id}: balance {balance_points}, ledger sum {ledger_sum}"
    )]
    IntegrityViolation {
        user_id: String,
        balance_points: i64,
        ledger_sum: i64,
    },

    #[error("Invalid payload for {event_type}: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("Duplicate event for key {dedup_key} (already recorded as {existing_event_id})")]
    DuplicateEvent {
        dedup_key: String,
        existing_event_id: String,
    },

    #[error("Event {event_id} has already been applied")]
    EventAlreadyApplied { event_id: String },

    #[error("Source event {event_id} is not in the event ledger")]
    UnknownSourceEvent { event_id: String },

    #[error("Request does not match source event {event_id}: {reason}")]
    SourceEventMismatch { event_id: String, reason: String },
}

impl RewardError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrencyConflict { .. } => true,
            Self::Persistence(e) => is_busy(e),
            _ => false,
        }
    }
}

/// SQLite reported the database as busy or locked by another writer
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RewardError::ConcurrencyConflict { attempts: 3 }.is_retryable());
        assert!(
            !RewardError::EventAlreadyApplied {
                event_id: "e1".to_string()
            }
            .is_retryable()
        );

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(RewardError::Persistence(busy).is_retryable());
    }
}
