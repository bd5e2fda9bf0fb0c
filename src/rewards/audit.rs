//! Ledger audit
//!
//! Recomputes each user's points from the append-only ledger and compares
//! the result with the mutable balance row.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::error::{Result, RewardError};
use super::ledger::{known_user_ids, ledger_totals, load_balance};
use super::levels::level_from_xp;

/// Audit result for a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub user_id: String,
    /// Points on the balance row (0 when no row exists)
    pub balance_points: i64,
    pub ledger_sum: i64,
    pub transaction_count: u64,
    pub has_balance_row: bool,
    /// `level` matches the level derived from `lifetime_xp`
    pub level_consistent: bool,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.balance_points == self.ledger_sum && self.level_consistent
    }

    /// Convert a points divergence into an error
    pub fn into_result(self) -> Result<AuditReport> {
        if self.balance_points != self.ledger_sum {
            return Err(RewardError::IntegrityViolation {
                user_id: self.user_id,
                balance_points: self.balance_points,
                ledger_sum: self.ledger_sum,
            });
        }
        Ok(self)
    }
}

pub(crate) fn audit_user(conn: &Connection, user_id: &str) -> Result<AuditReport> {
    let balance = load_balance(conn, user_id)?;
    let (ledger_sum, transaction_count) = ledger_totals(conn, user_id)?;

    Ok(AuditReport {
        user_id: user_id.to_string(),
        balance_points: balance.as_ref().map(|b| b.points).unwrap_or(0),
        ledger_sum,
        transaction_count,
        has_balance_row: balance.is_some(),
        level_consistent: balance
            .as_ref()
            .map(|b| b.level == level_from_xp(b.lifetime_xp))
            .unwrap_or(true),
    })
}

pub(crate) fn audit_all(conn: &Connection) -> Result<Vec<AuditReport>> {
    known_user_ids(conn)?
        .iter()
        .map(|user_id| audit_user(conn, user_id))
        .collect()
}
