//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` / `open_engine` - Engine setup from file and environment
//! - `find_user` - Username lookup
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use concierge_core::models::User;
use concierge_core::{Database, EngineConfig, SuggestionEngine};

/// Open the database, creating its directory if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Engine settings: the TOML file when given, then environment variables
pub fn load_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    match config_path {
        Some(path) => {
            let mut config = EngineConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config
                .apply_env(|key| std::env::var(key).ok())
                .context("Invalid environment configuration")?;
            Ok(config)
        }
        None => EngineConfig::from_env().context("Invalid environment configuration"),
    }
}

pub fn open_engine(db_path: &Path, config_path: Option<&Path>) -> Result<SuggestionEngine> {
    let db = open_db(db_path)?;
    let config = load_config(config_path)?;
    let engine = SuggestionEngine::new(db, config).context("Failed to create suggestion engine")?;
    if engine.llm_active() {
        tracing::debug!(model = %engine.config().llm.model, "LLM generator enabled");
    } else {
        tracing::debug!("LLM generator disabled, using rules only");
    }
    Ok(engine)
}

pub fn find_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)?
        .ok_or_else(|| anyhow::anyhow!("User '{}' not found", username))
}

/// Parse a YYYY-MM-DD date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (use YYYY-MM-DD)", value))
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let users = db.list_users(false)?;
    println!("   Users: {}", users.len());

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a user: concierge user add <name> --email <email>");
    println!("  2. Record spending: concierge tx add --user <name> 120.00 gas Shell");
    println!("  3. Generate suggestions: concierge analyze --user <name>");

    Ok(())
}
