//! Audit command implementation

use anyhow::{Result, bail};

use levelup::RewardEngine;

/// Compare balances with the point ledger; fails if any user diverges
pub async fn audit_command(engine: &RewardEngine, user_id: Option<String>) -> Result<()> {
    let reports = match user_id {
        Some(user_id) => vec![engine.audit_user(&user_id)?],
        None => engine.audit_all()?,
    };

    if reports.is_empty() {
        println!("Nothing to audit.");
        return Ok(());
    }

    let mut divergent = 0usize;
    for report in &reports {
        let status = if report.is_consistent() { "ok" } else { "MISMATCH" };
        println!(
            "  {:<8} {:<24} balance {:>8} ledger {:>8} ({} rows){}",
            status,
            report.user_id,
            report.balance_points,
            report.ledger_sum,
            report.transaction_count,
            if report.level_consistent { "" } else { " level drift" }
        );
        if !report.is_consistent() {
            divergent += 1;
        }
    }

    if divergent > 0 {
        bail!("{} of {} user(s) failed the ledger audit", divergent, reports.len());
    }
    println!("\nAll {} user(s) consistent.", reports.len());
    Ok(())
}
