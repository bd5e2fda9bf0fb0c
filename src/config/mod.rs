//! Configuration loading and management

mod io;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Reward store settings
    #[serde(default)]
    pub store: StoreSettings,

    /// Event ledger deduplication
    #[serde(default)]
    pub dedup: DedupSettings,
}

/// Reward store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite file (defaults to ~/.levelup/rewards.db)
    pub database_path: Option<PathBuf>,

    /// How long a writer waits on SQLite's lock before reporting busy
    pub busy_timeout_ms: u64,

    /// Attempts per reward commit before surfacing a conflict
    pub max_commit_retries: u32,

    /// Linear backoff step between commit attempts
    pub retry_backoff_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5000,
            max_commit_retries: 5,
            retry_backoff_ms: 10,
        }
    }
}

impl StoreSettings {
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| Config::global_config_dir().join("rewards.db"))
    }
}

/// Event ledger deduplication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Reject events whose dedup key was already recorded
    pub enabled: bool,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}
