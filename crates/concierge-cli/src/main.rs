//! Concierge CLI - Proactive personal-finance suggestions
//!
//! Usage:
//!   concierge init                          Initialize database
//!   concierge user add joao -e j@x.com      Create a user
//!   concierge tx add -u joao 120 gas Shell  Record a transaction
//!   concierge analyze --user joao           Generate and save suggestions
//!   concierge suggestions list -u joao      Review suggestions

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::User { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                UserAction::Add { username, email } => {
                    commands::cmd_user_add(&db, &username, &email)
                }
                UserAction::List { all } => commands::cmd_user_list(&db, all),
            }
        }
        Commands::Profile { action } => match action {
            ProfileAction::Show { username } => {
                let db = commands::open_db(&cli.db)?;
                commands::cmd_profile_show(&db, &username)
            }
            ProfileAction::Set {
                username,
                name,
                phone,
                birth_date,
                spouse_name,
                spouse_birth_date,
            } => {
                let update = commands::profile_update(
                    name,
                    phone,
                    birth_date.as_deref(),
                    spouse_name,
                    spouse_birth_date.as_deref(),
                )?;
                let engine = commands::open_engine(&cli.db, cli.config.as_deref())?;
                commands::cmd_profile_set(&engine, &username, &update).await
            }
            ProfileAction::Prefs {
                username,
                enable,
                disable,
                interests,
                max_daily,
            } => {
                let engine = commands::open_engine(&cli.db, cli.config.as_deref())?;
                let change = commands::PrefsChange {
                    enable,
                    disable,
                    interests,
                    max_daily,
                };
                commands::cmd_profile_prefs(&engine, &username, &change).await
            }
        },
        Commands::Tx { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                TxAction::Add {
                    user,
                    amount,
                    category,
                    description,
                    date,
                    kind,
                    location,
                } => commands::cmd_tx_add(
                    &db,
                    &user,
                    &amount,
                    &category,
                    &description,
                    date.as_deref(),
                    &kind,
                    location.as_deref(),
                ),
                TxAction::List { user, limit } => commands::cmd_tx_list(&db, &user, limit),
            }
        }
        Commands::Analyze { user, all, dry_run } => {
            let engine = commands::open_engine(&cli.db, cli.config.as_deref())?;
            if all {
                commands::cmd_analyze_all(&engine, dry_run).await
            } else {
                let user = user.ok_or_else(|| anyhow::anyhow!("--user or --all is required"))?;
                commands::cmd_analyze_user(&engine, &user, dry_run).await
            }
        }
        Commands::Suggestions { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                SuggestionsAction::List {
                    user,
                    status,
                    limit,
                    context,
                } => commands::cmd_suggestions_list(&db, &user, status.as_deref(), limit, context),
                SuggestionsAction::Stats { user } => commands::cmd_suggestions_stats(&db, &user),
            }
        }
        Commands::Interact {
            action,
            id,
            user,
            feedback,
            hours,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_interact(&db, &user, id, &action, feedback.as_deref(), hours)
        }
        Commands::Refine { id, feedback, user } => {
            let engine = commands::open_engine(&cli.db, cli.config.as_deref())?;
            commands::cmd_refine(&engine, &user, id, &feedback).await
        }
        Commands::Dashboard { user } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_dashboard(&db, &user)
        }
        Commands::Expire { user, grace_hours } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_expire(&db, user.as_deref(), grace_hours)
        }
    }
}
