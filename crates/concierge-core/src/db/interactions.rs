//! Interaction log and the lifecycle changes that produce it

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde_json::json;
use tracing::debug;

use super::suggestions::{get_suggestion_on, transition_on};
use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Interaction, InteractionAction, Suggestion};

fn row_to_interaction(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    let action: String = row.get(3)?;
    let extra: Option<String> = row.get(5)?;
    let timestamp: String = row.get(6)?;
    Ok(Interaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        suggestion_id: row.get(2)?,
        action: action.parse().unwrap_or(InteractionAction::Viewed),
        feedback: row.get(4)?,
        extra_data: extra.and_then(|e| serde_json::from_str(&e).ok()),
        timestamp: parse_datetime(&timestamp),
    })
}

impl Database {
    /// Apply a user's response to one of their suggestions and log it.
    ///
    /// Status-changing actions follow the one-way lifecycle; viewed,
    /// clicked and dismissed are only logged. Returns the updated suggestion.
    pub fn apply_interaction(
        &self,
        user_id: i64,
        suggestion_id: i64,
        action: InteractionAction,
        feedback: Option<&str>,
        snooze_hours: Option<i64>,
        now: NaiveDateTime,
    ) -> Result<Suggestion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let suggestion = get_suggestion_on(&tx, suggestion_id)?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", suggestion_id)))?;

        if let Some(next) = action.target_status() {
            transition_on(&tx, &suggestion, next, snooze_hours, now)?;
        }

        let extra = match action {
            InteractionAction::Snoozed => Some(json!({ "snooze_hours": snooze_hours }).to_string()),
            _ => None,
        };

        tx.execute(
            r#"
            INSERT INTO interactions (user_id, suggestion_id, action, feedback, extra_data, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                suggestion_id,
                action.as_str(),
                feedback,
                extra,
                format_datetime(now)
            ],
        )?;

        let updated = get_suggestion_on(&tx, suggestion_id)?
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", suggestion_id)))?;
        tx.commit()?;

        debug!(suggestion_id, action = %action, status = %updated.status, "Interaction recorded");
        Ok(updated)
    }

    /// Newest first, optionally filtered by action
    pub fn list_interactions(
        &self,
        user_id: i64,
        action: Option<InteractionAction>,
        limit: i64,
    ) -> Result<Vec<Interaction>> {
        let conn = self.conn()?;
        let action = action.map(|a| a.as_str());
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, suggestion_id, action, feedback, extra_data, timestamp
            FROM interactions
            WHERE user_id = ? AND (? IS NULL OR action = ?)
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )?;
        let interactions = stmt
            .query_map(params![user_id, action, action, limit], row_to_interaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(interactions)
    }

    /// Interaction counts per action, optionally since a point in time
    pub fn interaction_counts(
        &self,
        user_id: i64,
        since: Option<NaiveDateTime>,
    ) -> Result<BTreeMap<String, i64>> {
        let conn = self.conn()?;
        let since = since.map(format_datetime);
        let mut stmt = conn.prepare(
            r#"
            SELECT action, COUNT(*) FROM interactions
            WHERE user_id = ? AND (? IS NULL OR timestamp >= ?)
            GROUP BY action
            "#,
        )?;
        let counts = stmt
            .query_map(params![user_id, since, since], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// Most recent interaction time, if any
    pub fn last_interaction_at(&self, user_id: i64) -> Result<Option<NaiveDateTime>> {
        let conn = self.conn()?;
        let last: Option<String> = conn.query_row(
            "SELECT MAX(timestamp) FROM interactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(last.map(|l| super::parse_naive_datetime(&l)))
    }
}
