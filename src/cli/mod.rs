//! CLI command implementations

pub mod audit;
pub mod init;
pub mod record;
pub mod show;

use std::path::{Path, PathBuf};

use anyhow::Result;

use levelup::{Config, RewardEngine};

/// Load config and open the engine, honoring a `--db` override
pub fn open_engine(config_path: Option<&Path>, db_path: Option<PathBuf>) -> Result<RewardEngine> {
    let mut config = Config::load_from(config_path)?;
    if let Some(db_path) = db_path {
        config.store.database_path = Some(db_path);
    }
    tracing::debug!(
        "Using rewards db: {}",
        config.store.resolved_database_path().display()
    );
    RewardEngine::open(&config)
}
