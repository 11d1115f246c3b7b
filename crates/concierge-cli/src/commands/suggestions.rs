//! Suggestion command implementations (list, stats, interact, refine, expire)

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;
use concierge_core::models::{InteractionAction, SuggestionStatus};
use concierge_core::{Database, SuggestionEngine};

use super::{find_user, now, truncate};

fn status_icon(status: SuggestionStatus) -> &'static str {
    match status {
        SuggestionStatus::Pending => "🔔",
        SuggestionStatus::Accepted => "👍",
        SuggestionStatus::Rejected => "👎",
        SuggestionStatus::Snoozed => "💤",
        SuggestionStatus::Executed => "✅",
        SuggestionStatus::Expired => "⌛",
    }
}

pub fn cmd_suggestions_list(
    db: &Database,
    username: &str,
    status: Option<&str>,
    limit: i64,
    show_context: bool,
) -> Result<()> {
    let user = find_user(db, username)?;
    let status = status
        .map(SuggestionStatus::from_str)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let suggestions = db.list_suggestions(user.id, status, limit)?;

    if suggestions.is_empty() {
        println!("No suggestions found. Generate some with:");
        println!("  concierge analyze --user {}", user.username);
        return Ok(());
    }

    println!();
    println!("💡 Suggestions for {}", user.username);
    println!("   ─────────────────────────────────────────────────────────────");

    for s in suggestions {
        println!(
            "   {} [{}] {:>2} │ {:<14} │ {} │ {}",
            status_icon(s.status),
            s.id,
            s.priority,
            s.suggestion_type.as_str(),
            s.scheduled_date.format("%Y-%m-%d"),
            truncate(&s.content, 60)
        );
        if show_context {
            if let Some(ctx) = s.context() {
                println!("        {}", serde_json::to_string(&ctx)?);
            }
        }
    }

    Ok(())
}

pub fn cmd_suggestions_stats(db: &Database, username: &str) -> Result<()> {
    let user = find_user(db, username)?;
    let stats = db.suggestion_stats(user.id)?;

    println!();
    println!("📊 Suggestion Stats: {}", user.username);
    println!("   ─────────────────────────────");
    println!("   Total:            {}", stats.total);
    println!("   Pending:          {}", stats.pending);
    println!("   Accepted:         {}", stats.accepted);
    println!("   Rejected:         {}", stats.rejected);
    println!("   Executed:         {}", stats.executed);
    println!(
        "   Acceptance rate:  {:.1}%",
        stats.acceptance_rate * 100.0
    );
    println!("   Execution rate:   {:.1}%", stats.execution_rate * 100.0);
    if let Some(hours) = stats.average_hours_to_action {
        println!("   Avg. to execute:  {:.1}h", hours);
    }

    if !stats.by_type.is_empty() {
        println!();
        println!("   By type:");
        for (kind, count) in &stats.by_type {
            println!("     {:<16} {}", kind, count);
        }
    }

    Ok(())
}

pub fn cmd_interact(
    db: &Database,
    username: &str,
    suggestion_id: i64,
    action: &str,
    feedback: Option<&str>,
    snooze_hours: i64,
) -> Result<()> {
    let user = find_user(db, username)?;
    let action = InteractionAction::from_str(action).map_err(|e| anyhow::anyhow!(e))?;
    let hours = (action == InteractionAction::Snoozed).then_some(snooze_hours);

    let updated = db
        .apply_interaction(user.id, suggestion_id, action, feedback, hours, now())
        .with_context(|| format!("Failed to record '{}' on suggestion {}", action, suggestion_id))?;

    println!(
        "{} Suggestion {} is now {}",
        status_icon(updated.status),
        updated.id,
        updated.status
    );
    if action == InteractionAction::Snoozed {
        println!(
            "   Back on {}",
            updated.scheduled_date.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn cmd_refine(
    engine: &SuggestionEngine,
    username: &str,
    suggestion_id: i64,
    feedback: &str,
) -> Result<()> {
    let user = find_user(engine.db(), username)?;

    match engine.refine(user.id, suggestion_id, feedback).await? {
        Some(text) => {
            println!("✨ Refined suggestion:");
            println!("   {}", text);
        }
        None if !engine.llm_active() => {
            println!("Refinement needs the LLM. Set ANTHROPIC_API_KEY to enable it.");
        }
        None => {
            println!("⚠️  The model did not return a refinement. Try again later.");
        }
    }
    Ok(())
}

pub fn cmd_expire(db: &Database, username: Option<&str>, grace_hours: i64) -> Result<()> {
    let user_id = username.map(|name| find_user(db, name)).transpose()?.map(|u| u.id);
    let cutoff = now() - Duration::hours(grace_hours.max(0));
    let expired = db.expire_overdue_suggestions(user_id, cutoff)?;

    if expired == 0 {
        println!("✅ Nothing to expire.");
    } else {
        println!("⌛ Expired {} overdue suggestion(s).", expired);
    }
    Ok(())
}
