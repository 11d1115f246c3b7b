//! Database access layer with connection pooling and schema setup
//!
//! This module is organized by domain:
//! - `users` - User records
//! - `profiles` - Profiles, preferences, and audited updates
//! - `transactions` - Transaction store and pattern queries
//! - `suggestions` - Suggestion store, dedup checks, lifecycle
//! - `interactions` - Append-only interaction log
//! - `stats` - Suggestion statistics and dashboard

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod interactions;
mod profiles;
mod stats;
mod suggestions;
mod transactions;
mod users;

pub use profiles::{PREFERENCES_UPDATE_CATEGORY, PROFILE_UPDATE_CATEGORY};
pub use suggestions::SuggestionMatch;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Storage format for timestamps
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for calendar dates
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    parse_naive_datetime(s).and_utc()
}

/// Parse "YYYY-MM-DD HH:MM:SS", accepting a bare date as midnight
pub(crate) fn parse_naive_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(s, DATE_FORMAT).map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

pub(crate) fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn new(path: &str) -> Result<Self> {
        // Foreign keys are per-connection in SQLite
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "concierge_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- One profile per user; preferences are a JSON document
            CREATE TABLE IF NOT EXISTS profiles (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                name TEXT,
                phone TEXT,
                birth_date DATE,
                spouse_name TEXT,
                spouse_birth_date DATE,
                preferences TEXT,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Amounts are decimal text to keep them exact
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                amount TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'expense',
                category TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                date DATETIME NOT NULL,
                location TEXT,
                metadata TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_user_category ON transactions(user_id, category, description);

            CREATE TABLE IF NOT EXISTS suggestions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type TEXT NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                priority INTEGER NOT NULL CHECK (priority BETWEEN 1 AND 10),
                status TEXT NOT NULL DEFAULT 'pending',
                scheduled_at DATETIME NOT NULL,
                scheduled_day DATE NOT NULL,
                context_data TEXT,
                created_at DATETIME NOT NULL,
                executed_at DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_suggestions_user_status ON suggestions(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_suggestions_user_scheduled ON suggestions(user_id, scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_suggestions_user_type ON suggestions(user_id, type);
            -- Closes the check-then-insert race between concurrent generators.
            -- scheduled_day is the insert-time day; snooze only moves scheduled_at.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_suggestions_unique_draft
                ON suggestions(user_id, type, scheduled_day, content_hash);

            CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                suggestion_id INTEGER NOT NULL REFERENCES suggestions(id) ON DELETE CASCADE,
                action TEXT NOT NULL,
                feedback TEXT,
                extra_data TEXT,
                timestamp DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_user ON interactions(user_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_interactions_suggestion ON interactions(suggestion_id);
            "#,
        )?;

        info!("Database migrations complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
