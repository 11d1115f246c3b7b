//! Dashboard command implementation

use anyhow::Result;
use concierge_core::Database;

use super::{find_user, now};

pub fn cmd_dashboard(db: &Database, username: &str) -> Result<()> {
    let user = find_user(db, username)?;
    let now = now();
    let stats = db.dashboard_stats(user.id, now)?;

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│         🛎️  Concierge Dashboard          │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  User:            {}", user.username);
    println!("  Days active:     {}", stats.days_active);
    println!();
    println!("  🔔 Pending suggestions:   {}", stats.pending_suggestions);
    println!("  🗓️  Created this week:     {}", stats.suggestions_this_week);
    println!(
        "  👍 Acceptance rate:       {:.1}%",
        stats.acceptance_rate * 100.0
    );
    println!();
    println!(
        "  💸 This month: {} transaction(s), R$ {:.2}",
        stats.transactions_this_month, stats.spent_this_month
    );

    if let Some(last) = stats.last_activity {
        println!("  Last activity:   {}", last.format("%Y-%m-%d %H:%M"));
    }

    if let Some(next) = &stats.next_important_date {
        let days = (next.date - now.date()).num_days();
        println!();
        println!(
            "  🎂 Next: {} on {} (in {} day(s))",
            next.description,
            next.date.format("%d/%m"),
            days
        );
    }
    println!();

    if stats.pending_suggestions > 0 {
        println!(
            "  Run 'concierge suggestions list --user {}' to review them.",
            user.username
        );
    }

    Ok(())
}
