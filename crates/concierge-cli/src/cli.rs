//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default database location (~/.local/share/concierge/concierge.db on Linux)
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("concierge").join("concierge.db"))
        .unwrap_or_else(|| PathBuf::from("concierge.db"))
}

/// Concierge - Proactive suggestions from your spending
#[derive(Parser)]
#[command(name = "concierge")]
#[command(about = "Personal-finance concierge that suggests what to do next", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, env = "CONCIERGE_DB", default_value_os_t = default_db_path(), global = true)]
    pub db: PathBuf,

    /// Engine configuration file (TOML). Environment variables still apply on top.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Show or change a user's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Record and list transactions
    Tx {
        #[command(subcommand)]
        action: TxAction,
    },

    /// Generate suggestions
    Analyze {
        /// Username to analyze
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        user: Option<String>,

        /// Analyze every active user
        #[arg(long)]
        all: bool,

        /// Print drafts without saving them
        #[arg(long)]
        dry_run: bool,
    },

    /// List suggestions and their statistics
    Suggestions {
        #[command(subcommand)]
        action: SuggestionsAction,
    },

    /// Respond to a suggestion
    Interact {
        /// accept, reject, execute, snooze, view, dismiss or click
        action: String,

        /// Suggestion ID
        id: i64,

        /// Username owning the suggestion
        #[arg(short, long)]
        user: String,

        /// Free-text feedback stored with the interaction
        #[arg(short, long)]
        feedback: Option<String>,

        /// Hours to push a snoozed suggestion back
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Reword a suggestion using feedback (requires the LLM)
    Refine {
        /// Suggestion ID
        id: i64,

        /// What the user would like changed
        feedback: String,

        /// Username owning the suggestion
        #[arg(short, long)]
        user: String,
    },

    /// Show a user's dashboard summary
    Dashboard {
        /// Username
        #[arg(short, long)]
        user: String,
    },

    /// Expire suggestions whose scheduled date has passed
    Expire {
        /// Limit to one user
        #[arg(short, long)]
        user: Option<String>,

        /// Only expire suggestions overdue by more than this many hours
        #[arg(long, default_value = "0")]
        grace_hours: i64,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user with an empty profile
    Add {
        /// Username (unique)
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,
    },

    /// List users
    List {
        /// Include deactivated users
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show profile and preferences
    Show {
        /// Username
        username: String,
    },

    /// Update profile fields (omitted fields are left as they are)
    Set {
        /// Username
        username: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,

        #[arg(long)]
        spouse_name: Option<String>,

        /// Spouse birth date (YYYY-MM-DD)
        #[arg(long)]
        spouse_birth_date: Option<String>,
    },

    /// Change suggestion preferences
    Prefs {
        /// Username
        username: String,

        /// Turn a suggestion type on (repeatable)
        #[arg(long)]
        enable: Vec<String>,

        /// Turn a suggestion type off (repeatable)
        #[arg(long)]
        disable: Vec<String>,

        /// Replace categories of interest (comma-separated)
        #[arg(long, value_delimiter = ',')]
        interests: Option<Vec<String>>,

        /// Maximum suggestions per day
        #[arg(long)]
        max_daily: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum TxAction {
    /// Record a transaction
    Add {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Amount, e.g. 123.45
        amount: String,

        /// Category, e.g. restaurant, grocery, gas
        category: String,

        /// Description (usually the merchant)
        description: String,

        /// Transaction date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,

        /// expense, income or savings
        #[arg(long, default_value = "expense")]
        kind: String,

        #[arg(long)]
        location: Option<String>,
    },

    /// List recent transactions
    List {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum SuggestionsAction {
    /// List suggestions, highest priority first
    List {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Filter by status (pending, accepted, rejected, snoozed, executed, expired)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Show the stored context JSON
        #[arg(long)]
        context: bool,
    },

    /// Acceptance and execution statistics
    Stats {
        /// Username
        #[arg(short, long)]
        user: String,
    },
}
