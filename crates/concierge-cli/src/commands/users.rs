//! User command implementations

use anyhow::{Context, Result};
use concierge_core::Database;

pub fn cmd_user_add(db: &Database, username: &str, email: &str) -> Result<()> {
    if db.get_user_by_username(username.trim())?.is_some() {
        anyhow::bail!("User '{}' already exists", username.trim());
    }

    let id = db
        .create_user(username, email)
        .context("Failed to create user")?;

    println!("✅ Created user {} (id {})", username.trim(), id);
    println!(
        "   Add personal dates with: concierge profile set {} --spouse-name ... --spouse-birth-date YYYY-MM-DD",
        username.trim()
    );
    Ok(())
}

pub fn cmd_user_list(db: &Database, include_inactive: bool) -> Result<()> {
    let users = db.list_users(!include_inactive)?;

    if users.is_empty() {
        println!("No users found. Create one with:");
        println!("  concierge user add <name> --email <email>");
        return Ok(());
    }

    println!();
    println!("👥 Users");
    println!("   ─────────────────────────────────────────────");

    for user in users {
        let marker = if user.active { "" } else { " (inactive)" };
        println!(
            "   [{}] {} <{}>{}",
            user.id, user.username, user.email, marker
        );
    }

    Ok(())
}
