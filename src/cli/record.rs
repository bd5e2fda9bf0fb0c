//! Reward-granting commands: record, login, xp

use anyhow::{Context, Result};
use serde_json::Value;

use levelup::rewards::{Event, RewardOutcome, XpOutcome};
use levelup::RewardEngine;

/// Record an event and apply the reward rules to it
pub async fn record_command(
    engine: &RewardEngine,
    user_id: &str,
    event_type: &str,
    payload: Option<String>,
) -> Result<()> {
    let payload: Value = match payload {
        Some(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("Payload is not valid JSON: {}", raw))?,
        None => Value::Object(Default::default()),
    };

    let (event, outcome) = engine.record_and_apply(user_id, event_type, payload)?;
    print_outcome(&event, &outcome);
    Ok(())
}

/// Record today's login
pub async fn login_command(engine: &RewardEngine, user_id: &str) -> Result<()> {
    let payload = Value::Object(Default::default());
    let (event, outcome) = engine.record_and_apply(user_id, "daily_login", payload)?;
    print_outcome(&event, &outcome);
    Ok(())
}

/// Apply a raw XP adjustment
pub async fn xp_command(engine: &RewardEngine, user_id: &str, delta: i64) -> Result<()> {
    let outcome = engine.apply_xp(user_id, delta)?;
    print_xp(&outcome);
    Ok(())
}

fn print_outcome(event: &Event, outcome: &RewardOutcome) {
    println!("Event {} ({})", event.id, event.event_type);
    println!("  Points: {:+}", outcome.points_delta);
    println!("  XP:     {:+}", outcome.xp_delta);
    println!("  Level:  {}", outcome.new_level);

    if let Some(streak) = &outcome.streak {
        println!(
            "  Streak: {} day(s), best {}, x{:.2} ({})",
            streak.count,
            streak.longest,
            streak.multiplier,
            streak.transition.as_str()
        );
    }

    if let Some(level_up) = &outcome.level_up {
        println!(
            "\n  LEVEL UP! {} -> {}",
            level_up.previous_level, level_up.new_level
        );
    }
}

fn print_xp(outcome: &XpOutcome) {
    println!("Lifetime XP: {}", outcome.lifetime_xp);
    println!("Level:       {}", outcome.new_level);
    if let Some(level_up) = &outcome.level_up {
        println!(
            "\nLEVEL UP! {} -> {}",
            level_up.previous_level, level_up.new_level
        );
    }
}
