//! Suggestion generation commands

use anyhow::{Context, Result};
use concierge_core::models::SuggestionDraft;
use concierge_core::SuggestionEngine;

use super::{find_user, now, truncate};

pub async fn cmd_analyze_user(engine: &SuggestionEngine, username: &str, dry_run: bool) -> Result<()> {
    let user = find_user(engine.db(), username)?;
    println!("🔍 Analyzing {}...", user.username);
    print_mode(engine);

    let now = now();
    if dry_run {
        let drafts = engine
            .analyze_user_at(user.id, now)
            .await
            .context("Analysis failed")?;
        print_drafts(&drafts);
        println!();
        println!("   (dry run, nothing saved)");
        return Ok(());
    }

    let ids = engine
        .analyze_and_persist(user.id, now)
        .await
        .context("Analysis failed")?;

    println!();
    if ids.is_empty() {
        println!("✅ No new suggestions for {}.", user.username);
    } else {
        println!("✅ {} new suggestion(s) saved:", ids.len());
        for id in &ids {
            if let Some(s) = engine.db().get_suggestion(*id)? {
                println!(
                    "   [{}] {:>2} │ {:<14} │ {}",
                    s.id,
                    s.priority,
                    s.suggestion_type.as_str(),
                    truncate(&s.content, 70)
                );
            }
        }
    }
    Ok(())
}

pub async fn cmd_analyze_all(engine: &SuggestionEngine, dry_run: bool) -> Result<()> {
    println!("🔍 Analyzing all active users...");
    print_mode(engine);

    let now = now();
    if dry_run {
        for user in engine.db().list_users(true)? {
            println!();
            println!("👤 {}", user.username);
            match engine.analyze_user_at(user.id, now).await {
                Ok(drafts) => print_drafts(&drafts),
                Err(e) => println!("   ❌ {}", e),
            }
        }
        println!();
        println!("   (dry run, nothing saved)");
        return Ok(());
    }

    let report = engine.analyze_all(now).await.context("Batch analysis failed")?;

    println!();
    println!("📊 Batch Results");
    println!("   ─────────────────────────────");
    println!("   Users analyzed:   {}", report.users);
    println!("   New suggestions:  {}", report.inserted);
    if report.failed > 0 {
        println!("   ⚠️  Failed users:   {}", report.failed);
    }
    Ok(())
}

fn print_mode(engine: &SuggestionEngine) {
    if engine.llm_active() {
        println!("   🤖 LLM generator enabled ({})", engine.config().llm.model);
    } else {
        println!("   💡 Tip: Set ANTHROPIC_API_KEY for personalized suggestions");
    }
}

fn print_drafts(drafts: &[SuggestionDraft]) {
    if drafts.is_empty() {
        println!("   No suggestions right now.");
        return;
    }
    for draft in drafts {
        println!(
            "   {:>2} │ {:<14} │ {} │ {}",
            draft.priority,
            draft.suggestion_type.as_str(),
            draft.scheduled_date.format("%Y-%m-%d"),
            truncate(&draft.content, 70)
        );
    }
}
