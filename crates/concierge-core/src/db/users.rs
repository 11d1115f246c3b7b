//! User operations

use rusqlite::{params, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::User;

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        active: row.get(3)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a user and an empty profile with default preferences
    pub fn create_user(&self, username: &str, email: &str) -> Result<i64> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidData("username must not be empty".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (username, email) VALUES (?, ?)",
            params![username, email.trim()],
        )?;
        let user_id = tx.last_insert_rowid();

        let prefs = serde_json::to_string(&crate::models::Preferences::default())?;
        tx.execute(
            "INSERT INTO profiles (user_id, preferences) VALUES (?, ?)",
            params![user_id, prefs],
        )?;
        tx.commit()?;

        Ok(user_id)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        match conn.query_row(
            "SELECT id, username, email, active, created_at FROM users WHERE id = ?",
            params![id],
            row_to_user,
        ) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        match conn.query_row(
            "SELECT id, username, email, active, created_at FROM users WHERE username = ?",
            params![username],
            row_to_user,
        ) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List users, optionally only active ones, ordered by id
    pub fn list_users(&self, active_only: bool) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let sql = if active_only {
            "SELECT id, username, email, active, created_at FROM users WHERE active = TRUE ORDER BY id"
        } else {
            "SELECT id, username, email, active, created_at FROM users ORDER BY id"
        };
        let mut stmt = conn.prepare(sql)?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET active = ? WHERE id = ?",
            params![active, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    /// Delete a user; profile, transactions and suggestions cascade
    pub fn delete_user(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
