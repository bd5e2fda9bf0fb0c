//! Shared test utilities for reward engine integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use levelup::{Config, RewardEngine};

/// Temporary directory holding a fresh rewards database
pub struct TestStore {
    pub dir: TempDir,
    pub config: Config,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.store.database_path = Some(dir.path().join("rewards.db"));
        // Stress tests contend on a single file
        config.store.busy_timeout_ms = 10_000;
        config.store.max_commit_retries = 20;
        Self { dir, config }
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.store.resolved_database_path()
    }

    /// Open a new engine with its own connection, like a separate service instance
    pub fn engine(&self) -> RewardEngine {
        RewardEngine::open(&self.config).expect("Failed to open reward engine")
    }
}
