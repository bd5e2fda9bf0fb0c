//! Gamification reward engine
//!
//! Turns rewardable user actions into points, XP, levels and daily streaks,
//! backed by an append-only point ledger in SQLite.
//!
//! # Architecture
//!
//! ```text
//!   caller ──record_event──▶ reward_events (dedup, provenance)
//!     │
//!     └────apply_rules────▶ ┌───────────── one IMMEDIATE transaction ─────────────┐
//!                           │ mark event applied → streak (daily_login) → rules    │
//!                           │ → XP + level → points + point_transactions row       │
//!                           └──────────────────────────────────────────────────────┘
//!                                   │ commit
//!                                   ▼
//!                           observers (badges, goals; best effort)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = RewardEngine::open(&Config::load()?)?;
//!
//! let event = engine.record_event("user-1", "test_solved", json!({"firstAttempt": true}))?;
//! let outcome = engine.apply_rules(&RewardRequest::from(&event))?;
//! if let Some(level_up) = outcome.level_up { /* celebrate */ }
//! ```

mod audit;
mod db;
mod error;
mod event_log;
mod events;
mod ledger;
mod levels;
mod models;
mod observers;
mod rules;
mod streaks;
mod time_bucket;

pub use audit::AuditReport;
pub use db::RewardDb;
pub use error::{Result, RewardError};
pub use events::{
    Event, EventPayload, EventType, LessonCompletePayload, RewardRequest, TargetPayload,
    TestSolvedPayload,
};
pub use levels::{LEVEL_CAP, LevelProgress, LevelUp, level_from_xp, xp_for_level};
pub use models::{Balance, LeaderboardEntry, PointTransaction, RewardOutcome, XpOutcome};
pub use observers::RewardObserver;
pub use rules::{REWARD_TABLE, RewardDelta, RewardRule, compute_delta};
pub use streaks::{StreakState, StreakTransition, StreakUpdate, streak_multiplier};
pub use time_bucket::{day_bucket, parse_day_bucket, utc_day};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;

/// Entry point for all reward operations
///
/// Holds no per-user state; every call re-reads the rows it needs inside its
/// own transaction. Cloning is cheap and clones share one connection.
#[derive(Clone)]
pub struct RewardEngine {
    db: RewardDb,
    dedup_enabled: bool,
    observers: Vec<Arc<dyn RewardObserver>>,
}

impl RewardEngine {
    pub fn new(db: RewardDb, config: &Config) -> Self {
        Self {
            db,
            dedup_enabled: config.dedup.enabled,
            observers: Vec::new(),
        }
    }

    /// Open the database configured in `config`
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let db = RewardDb::open_with(&config.store)?;
        Ok(Self::new(db, config))
    }

    /// Open a database at a custom path with default settings
    pub fn with_path(path: &Path) -> anyhow::Result<Self> {
        let config = Config::default();
        let db = RewardDb::open_at(path, &config.store)?;
        Ok(Self::new(db, &config))
    }

    /// Register a post-commit observer
    pub fn with_observer(mut self, observer: Arc<dyn RewardObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    // ========================================
    // EVENT LEDGER
    // ========================================

    /// Record a rewardable action in the event ledger
    pub fn record_event(&self, user_id: &str, event_type: &str, payload: Value) -> Result<Event> {
        self.record_event_at(user_id, event_type, payload, Utc::now())
    }

    pub fn record_event_at(
        &self,
        user_id: &str,
        event_type: &str,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let typed = EventPayload::parse(event_type, &payload)?;
        let dedup_key = if self.dedup_enabled {
            typed.dedup_key(user_id, utc_day(now))
        } else {
            None
        };
        let now_ms = now.timestamp_millis();

        let event = self.db.write_tx(|tx| {
            event_log::insert_event(tx, user_id, event_type, &payload, dedup_key.as_deref(), now_ms)
        })?;
        debug!(event_id = %event.id, user_id, event_type, "Recorded reward event");
        Ok(event)
    }

    /// Record an event and immediately apply the rules to it
    pub fn record_and_apply(
        &self,
        user_id: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<(Event, RewardOutcome)> {
        let now = Utc::now();
        let event = self.record_event_at(user_id, event_type, payload, now)?;
        let outcome = self.apply_rules_at(&RewardRequest::from(&event), now)?;
        Ok((event, outcome))
    }

    // ========================================
    // RULES ENGINE
    // ========================================

    /// Apply the reward rules to one event
    pub fn apply_rules(&self, request: &RewardRequest) -> Result<RewardOutcome> {
        self.apply_rules_at(request, Utc::now())
    }

    /// Apply the reward rules as of `now`.
    ///
    /// Streak, XP, level, points and the ledger row commit together or not
    /// at all. Observers run after the commit.
    pub fn apply_rules_at(
        &self,
        request: &RewardRequest,
        now: DateTime<Utc>,
    ) -> Result<RewardOutcome> {
        let payload = EventPayload::parse(&request.event_type, &request.payload)?;
        let today = utc_day(now);
        let now_ms = now.timestamp_millis();

        let outcome = self
            .db
            .write_tx(|tx| Self::apply_rules_in(tx, request, &payload, today, now_ms))?;

        debug!(
            user_id = %request.user_id,
            event_type = %request.event_type,
            points = outcome.points_delta,
            xp = outcome.xp_delta,
            "Applied reward rules"
        );
        if let Some(level_up) = &outcome.level_up {
            info!(
                user_id = %request.user_id,
                from = level_up.previous_level,
                to = level_up.new_level,
                "Level up"
            );
        }

        observers::dispatch(&self.observers, request, &outcome);
        Ok(outcome)
    }

    fn apply_rules_in(
        conn: &Connection,
        request: &RewardRequest,
        payload: &EventPayload,
        today: NaiveDate,
        now_ms: i64,
    ) -> Result<RewardOutcome> {
        let user_id = request.user_id.as_str();

        if let Some(event_id) = &request.source_event_id {
            event_log::mark_applied(conn, event_id, request, now_ms)?;
        }

        let streak = match payload {
            EventPayload::DailyLogin => {
                Some(Self::advance_streak_in(conn, user_id, today, now_ms)?)
            }
            _ => None,
        };
        let multiplier = streak.as_ref().map(|s| s.multiplier).unwrap_or(1.0);
        let delta = compute_delta(payload, multiplier);

        let xp = Self::apply_xp_in(conn, user_id, delta.xp, now_ms)?;

        let transaction_id = if delta.points != 0 {
            ledger::increment_points(conn, user_id, delta.points, now_ms)?;
            Some(ledger::append_transaction(
                conn,
                user_id,
                delta.points,
                &request.event_type,
                request.source_event_id.as_deref(),
                now_ms,
            )?)
        } else {
            None
        };

        Ok(RewardOutcome {
            points_delta: delta.points,
            xp_delta: delta.xp,
            level_up: xp.level_up,
            new_level: xp.new_level,
            streak,
            transaction_id,
        })
    }

    // ========================================
    // XP & LEVEL OPERATIONS
    // ========================================

    /// Apply an XP delta directly, flooring lifetime XP at zero
    pub fn apply_xp(&self, user_id: &str, delta: i64) -> Result<XpOutcome> {
        let now_ms = Utc::now().timestamp_millis();
        let outcome = self
            .db
            .write_tx(|tx| Self::apply_xp_in(tx, user_id, delta, now_ms))?;
        if let Some(level_up) = &outcome.level_up {
            info!(user_id, from = level_up.previous_level, to = level_up.new_level, "Level up");
        }
        Ok(outcome)
    }

    fn apply_xp_in(conn: &Connection, user_id: &str, delta: i64, now_ms: i64) -> Result<XpOutcome> {
        let (current_xp, current_level) = ledger::load_balance(conn, user_id)?
            .map(|b| (b.lifetime_xp, b.level))
            .unwrap_or((0, 1));

        let lifetime_xp = current_xp.saturating_add(delta).max(0);
        let new_level = level_from_xp(lifetime_xp);

        // Zero deltas never create a balance row
        if delta != 0 {
            ledger::write_xp(conn, user_id, lifetime_xp, new_level, now_ms)?;
        }

        let level_up = (new_level > current_level).then_some(LevelUp {
            previous_level: current_level,
            new_level,
        });

        Ok(XpOutcome {
            level_up,
            new_level,
            lifetime_xp,
        })
    }

    // ========================================
    // STREAK OPERATIONS
    // ========================================

    /// Advance the daily login streak for `now` (defaults to the current time)
    pub fn update_daily_login_streak(
        &self,
        user_id: &str,
        now: Option<DateTime<Utc>>,
    ) -> Result<StreakUpdate> {
        let now = now.unwrap_or_else(Utc::now);
        let today = utc_day(now);
        let now_ms = now.timestamp_millis();
        self.db
            .write_tx(|tx| Self::advance_streak_in(tx, user_id, today, now_ms))
    }

    fn advance_streak_in(
        conn: &Connection,
        user_id: &str,
        today: NaiveDate,
        now_ms: i64,
    ) -> Result<StreakUpdate> {
        let mut state = ledger::load_streak(conn, user_id)?.unwrap_or_default();
        let transition = state.advance(today);
        if transition.is_mutating() {
            ledger::save_streak(conn, user_id, &state, now_ms)?;
        }
        debug!(
            user_id,
            streak = state.current_streak,
            transition = transition.as_str(),
            "Streak updated"
        );
        Ok(StreakUpdate::new(&state, transition))
    }

    // ========================================
    // READ MODELS
    // ========================================

    pub fn balance(&self, user_id: &str) -> Result<Option<Balance>> {
        Ok(ledger::load_balance(&self.db.conn(), user_id)?)
    }

    /// Level progress for a user (level 1 / 0 XP when unknown)
    pub fn level_progress(&self, user_id: &str) -> Result<LevelProgress> {
        let xp = self.balance(user_id)?.map(|b| b.lifetime_xp).unwrap_or(0);
        Ok(LevelProgress::new(xp))
    }

    pub fn streak(&self, user_id: &str) -> Result<Option<StreakState>> {
        Ok(ledger::load_streak(&self.db.conn(), user_id)?)
    }

    /// Most recent ledger rows, newest first
    pub fn transactions(&self, user_id: &str, limit: usize) -> Result<Vec<PointTransaction>> {
        Ok(ledger::list_transactions(&self.db.conn(), user_id, limit)?)
    }

    /// Most recent recorded events, newest first
    pub fn events(&self, user_id: &str, limit: usize) -> Result<Vec<Event>> {
        Ok(event_log::list_events(&self.db.conn(), user_id, limit)?)
    }

    pub fn event(&self, event_id: &str) -> Result<Option<Event>> {
        Ok(event_log::load_event(&self.db.conn(), event_id)?)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        Ok(ledger::leaderboard(&self.db.conn(), limit)?)
    }

    // ========================================
    // AUDIT
    // ========================================

    pub fn audit_user(&self, user_id: &str) -> Result<AuditReport> {
        audit::audit_user(&self.db.conn(), user_id)
    }

    /// Fail with `IntegrityViolation` if the balance and ledger disagree
    pub fn verify_user(&self, user_id: &str) -> Result<AuditReport> {
        self.audit_user(user_id)?.into_result()
    }

    pub fn audit_all(&self) -> Result<Vec<AuditReport>> {
        audit::audit_all(&self.db.conn())
    }
}
