//! Profile and preference command implementations
//!
//! Changing either one re-runs suggestion generation for the user.

use anyhow::{Context, Result};
use concierge_core::models::{ProfileUpdate, SuggestionType};
use concierge_core::{Database, SuggestionEngine};

use super::{find_user, now, parse_date};

/// Preference edits requested on the command line
#[derive(Debug, Default)]
pub struct PrefsChange {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub interests: Option<Vec<String>>,
    pub max_daily: Option<u32>,
}

/// Build a profile update from raw CLI values
pub fn profile_update(
    name: Option<String>,
    phone: Option<String>,
    birth_date: Option<&str>,
    spouse_name: Option<String>,
    spouse_birth_date: Option<&str>,
) -> Result<ProfileUpdate> {
    Ok(ProfileUpdate {
        name,
        phone,
        birth_date: birth_date.map(parse_date).transpose()?,
        spouse_name,
        spouse_birth_date: spouse_birth_date.map(parse_date).transpose()?,
    })
}

pub fn cmd_profile_show(db: &Database, username: &str) -> Result<()> {
    let user = find_user(db, username)?;
    let profile = db
        .get_profile(user.id)?
        .ok_or_else(|| anyhow::anyhow!("No profile for user '{}'", username))?;

    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!();
    println!("👤 Profile: {}", user.username);
    println!("   ─────────────────────────────────────────────");
    println!("   Name:          {}", profile.name.as_deref().unwrap_or("-"));
    println!("   Phone:         {}", profile.phone.as_deref().unwrap_or("-"));
    println!("   Birth date:    {}", date(profile.birth_date));
    println!(
        "   Spouse:        {}",
        profile.spouse_name.as_deref().unwrap_or("-")
    );
    println!("   Spouse birth:  {}", date(profile.spouse_birth_date));

    let prefs = &profile.preferences;
    println!();
    println!("⚙️  Preferences");
    for (kind, enabled) in &prefs.suggestion_categories {
        println!("   {} {}", if *enabled { "✓" } else { "✗" }, kind);
    }
    if !prefs.categories_of_interest.is_empty() {
        println!("   Interests:     {}", prefs.categories_of_interest.join(", "));
    }
    println!(
        "   Preferred:     {}",
        prefs.preferred_times.enabled().join(", ")
    );
    println!("   Max per day:   {}", prefs.max_daily_suggestions);

    Ok(())
}

pub async fn cmd_profile_set(
    engine: &SuggestionEngine,
    username: &str,
    update: &ProfileUpdate,
) -> Result<()> {
    if update.is_empty() {
        println!("Nothing to update. Pass at least one field, e.g. --spouse-name.");
        return Ok(());
    }

    let user = find_user(engine.db(), username)?;
    let change = engine
        .update_profile(user.id, update, now())
        .await
        .context("Failed to update profile")?;

    println!(
        "✅ Updated {} for {}",
        update.changed_fields().join(", "),
        user.username
    );
    report_new_suggestions(change.inserted.len());
    Ok(())
}

pub async fn cmd_profile_prefs(
    engine: &SuggestionEngine,
    username: &str,
    change: &PrefsChange,
) -> Result<()> {
    let user = find_user(engine.db(), username)?;
    let profile = engine
        .db()
        .get_profile(user.id)?
        .ok_or_else(|| anyhow::anyhow!("No profile for user '{}'", username))?;

    let mut prefs = profile.preferences;
    for (names, enabled) in [(&change.enable, true), (&change.disable, false)] {
        for name in names {
            let kind: SuggestionType = name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            prefs
                .suggestion_categories
                .insert(kind.as_str().to_string(), enabled);
        }
    }
    if let Some(interests) = &change.interests {
        prefs.categories_of_interest = interests
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(max) = change.max_daily {
        prefs.max_daily_suggestions = max;
    }

    let result = engine
        .update_preferences(user.id, &prefs, now())
        .await
        .context("Failed to update preferences")?;

    println!("✅ Preferences updated for {}", user.username);
    report_new_suggestions(result.inserted.len());
    Ok(())
}

fn report_new_suggestions(count: usize) {
    if count > 0 {
        println!(
            "   💡 {} new suggestion(s). See them with 'concierge suggestions list'.",
            count
        );
    }
}
