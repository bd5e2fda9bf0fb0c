//! levelup - gamification reward engine
//!
//! Turns discrete user actions (logging in, finishing a lesson, solving a
//! test, winning a hackathon) into durable point and XP changes, level
//! transitions and daily streaks.
//!
//! ## Guarantees
//!
//! 1. **Ledger consistency**: a user's point balance always equals the sum
//!    of their append-only ledger rows.
//! 2. **Level consistency**: the stored level is always the level derived
//!    from lifetime XP.
//! 3. **Atomicity**: streak, XP, level, points and the ledger row for one
//!    event commit together, serialized per database across threads and
//!    processes.

pub mod config;
pub mod rewards;

pub use config::Config;
pub use rewards::RewardEngine;
