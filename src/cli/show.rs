//! Read-only commands: show, history, leaderboard

use anyhow::Result;
use chrono::DateTime;

use levelup::RewardEngine;

/// Show balance, level progress and streak for a user
pub async fn show_command(engine: &RewardEngine, user_id: &str) -> Result<()> {
    let Some(balance) = engine.balance(user_id)? else {
        println!("No rewards recorded for {}.", user_id);
        return Ok(());
    };
    let progress = balance.progress();

    println!("User {}\n", user_id);
    println!("  Points:      {}", balance.points);
    println!("  Lifetime XP: {}", balance.lifetime_xp);
    match progress.next_level_xp {
        Some(next) => println!(
            "  Level:       {} ({:.0}% to {}, {} XP left, next at {})",
            balance.level,
            progress.progress_to_next() * 100.0,
            balance.level + 1,
            progress.xp_to_next(),
            next
        ),
        None => println!("  Level:       {} (max)", balance.level),
    }

    if let Some(streak) = engine.streak(user_id)? {
        println!(
            "  Streak:      {} day(s), best {}, {} active day(s) total, x{:.2}",
            streak.current_streak,
            streak.longest_streak,
            streak.total_days_active,
            streak.multiplier()
        );
    }

    Ok(())
}

/// Show ledger rows (or raw events) for a user, newest first
pub async fn history_command(
    engine: &RewardEngine,
    user_id: &str,
    limit: usize,
    events: bool,
) -> Result<()> {
    if events {
        let events = engine.events(user_id, limit)?;
        if events.is_empty() {
            println!("No events found.");
            return Ok(());
        }
        println!("Events ({}):\n", events.len());
        for event in events {
            println!(
                "  {} {} {} {}{}",
                format_ms(event.created_at),
                event.event_type,
                event.id,
                event.payload,
                if event.applied_at.is_some() { "" } else { " (not applied)" }
            );
        }
        return Ok(());
    }

    let transactions = engine.transactions(user_id, limit)?;
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    println!("Transactions ({}):\n", transactions.len());
    for tx in transactions {
        println!(
            "  {} {:>+6} {} {}",
            format_ms(tx.created_at),
            tx.delta,
            tx.reason,
            tx.source_event_id.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// Show the top users by lifetime XP
pub async fn leaderboard_command(engine: &RewardEngine, limit: usize) -> Result<()> {
    let entries = engine.leaderboard(limit)?;
    if entries.is_empty() {
        println!("Leaderboard is empty.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "  #{:<3} {:<24} level {:<4} {:>8} XP {:>8} pts",
            entry.rank, entry.user_id, entry.level, entry.lifetime_xp, entry.points
        );
    }
    Ok(())
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
