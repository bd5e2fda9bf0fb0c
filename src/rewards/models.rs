//! Data models for the reward store
//!
//! These structures represent rows stored in and queried from the rewards
//! database, plus the outcomes returned to callers.

use serde::{Deserialize, Serialize};

use super::levels::{LevelProgress, LevelUp};
use super::streaks::StreakUpdate;

/// Mutable balance row for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: String,
    pub points: i64,
    pub lifetime_xp: i64,
    pub level: u32,
    /// ms since epoch
    pub updated_at: i64,
}

impl Balance {
    pub fn progress(&self) -> LevelProgress {
        LevelProgress::new(self.lifetime_xp)
    }
}

/// Append-only point ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: String,
    pub user_id: String,
    pub delta: i64,
    /// Event type tag that caused the change
    pub reason: String,
    pub source_event_id: Option<String>,
    pub created_at: i64,
}

/// Result of applying an XP delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpOutcome {
    pub level_up: Option<LevelUp>,
    pub new_level: u32,
    pub lifetime_xp: i64,
}

/// Result of running the rules engine for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardOutcome {
    pub points_delta: i64,
    pub xp_delta: i64,
    pub level_up: Option<LevelUp>,
    pub new_level: u32,
    /// Streak state after the update (daily_login only)
    pub streak: Option<StreakUpdate>,
    /// Ledger row written for the points change, if any
    pub transaction_id: Option<String>,
}

/// One row of the XP leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub level: u32,
    pub lifetime_xp: i64,
    pub points: i64,
}
