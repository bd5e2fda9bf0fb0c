//! SQLite database connection and schema management for rewards
//!
//! Manages the rewards database (`~/.levelup/rewards.db` by default). Every
//! rewarding unit of work goes through
//! [`RewardDb::write_tx`], which opens a `BEGIN IMMEDIATE` transaction so that
//! concurrent writers (threads or separate processes) are serialized before
//! they read any state.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, warn};

use super::error::{RewardError, is_busy};
use crate::config::StoreSettings;

/// Database handle shared by the engine and its read models
#[derive(Clone)]
pub struct RewardDb {
    conn: Arc<Mutex<Connection>>,
    max_commit_retries: u32,
    retry_backoff: Duration,
}

impl RewardDb {
    /// Open or create the database described by `settings`
    pub fn open_with(settings: &StoreSettings) -> Result<Self> {
        let path = settings.resolved_database_path();
        Self::open_at(&path, settings)
    }

    /// Open or create the database at a specific path with default settings
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_at(path, &StoreSettings::default())
    }

    pub fn open_at(path: &Path, settings: &StoreSettings) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create rewards dir: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open rewards db: {}", path.display()))?;

        // WAL lets readers proceed while one writer holds the reserved lock
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            max_commit_retries: settings.max_commit_retries.max(1),
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Lock the connection for a read
    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Open transactions roll back on unwind, so a poisoned guard is still usable
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `work` inside an immediate write transaction, retrying on contention.
    ///
    /// The closure may run several times; it must derive everything from the
    /// transaction it is handed. A non-busy error rolls the transaction back
    /// and is returned as is.
    pub(crate) fn write_tx<T, F>(&self, mut work: F) -> Result<T, RewardError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, RewardError>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_write_tx(&mut work) {
                Ok(value) => return Ok(value),
                Err(RewardError::Persistence(e)) if is_busy(&e) => {
                    if attempt >= self.max_commit_retries {
                        warn!(attempts = attempt, "Reward commit kept conflicting, giving up");
                        return Err(RewardError::ConcurrencyConflict { attempts: attempt });
                    }
                    debug!(attempt, "Reward commit conflicted, retrying");
                    thread::sleep(self.retry_backoff * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_write_tx<T, F>(&self, work: &mut F) -> Result<T, RewardError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, RewardError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    /// Run any pending migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )?;

        // Migration 2: at most one ledger row per source event
        if version < 2 {
            conn.execute_batch(
                r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_tx_source_event
                    ON point_transactions(source_event_id)
                    WHERE source_event_id IS NOT NULL;
                INSERT OR REPLACE INTO schema_version VALUES (2);
                "#,
            )?;
            debug!(from = version, "Migrated rewards schema to version 2");
        }

        Ok(())
    }
}

/// SQL schema for the rewards database
const SCHEMA_SQL: &str = r#"
-- Event ledger (append-only, one row per rewardable action)
CREATE TABLE IF NOT EXISTS reward_events (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    dedup_key TEXT UNIQUE,
    created_at INTEGER NOT NULL,
    applied_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_event_user ON reward_events(user_id, created_at);

-- Mutable balance (one row per user)
CREATE TABLE IF NOT EXISTS user_balances (
    user_id TEXT PRIMARY KEY,
    points INTEGER NOT NULL DEFAULT 0,
    lifetime_xp INTEGER NOT NULL DEFAULT 0 CHECK (lifetime_xp >= 0),
    level INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_balance_xp ON user_balances(lifetime_xp DESC);

-- Point ledger (append-only)
CREATE TABLE IF NOT EXISTS point_transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    delta INTEGER NOT NULL,
    reason TEXT NOT NULL,
    source_event_id TEXT REFERENCES reward_events(id),
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tx_user ON point_transactions(user_id, created_at);

-- Daily login streaks (one row per user)
CREATE TABLE IF NOT EXISTS user_streaks (
    user_id TEXT PRIMARY KEY,
    current_streak INTEGER NOT NULL DEFAULT 0,
    longest_streak INTEGER NOT NULL DEFAULT 0,
    last_activity_date TEXT,
    total_days_active INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;
