//! Suggestion store: inserts, duplicate checks and lifecycle updates

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use super::{format_date, format_datetime, parse_datetime, parse_naive_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Suggestion, SuggestionDraft, SuggestionStatus, SuggestionType};

const SUGGESTION_COLUMNS: &str = "id, user_id, type, content, priority, status, scheduled_at, \
     context_data, content_hash, created_at, executed_at";

fn row_to_suggestion(row: &Row<'_>) -> rusqlite::Result<Suggestion> {
    let type_str: String = row.get(2)?;
    let status_str: String = row.get(5)?;
    let scheduled: String = row.get(6)?;
    let created: String = row.get(9)?;
    let executed: Option<String> = row.get(10)?;

    Ok(Suggestion {
        id: row.get(0)?,
        user_id: row.get(1)?,
        suggestion_type: type_str.parse().unwrap_or(SuggestionType::Routine),
        content: row.get(3)?,
        priority: row.get(4)?,
        status: status_str.parse().unwrap_or_default(),
        scheduled_date: parse_naive_datetime(&scheduled),
        context_data: row.get(7)?,
        content_hash: row.get(8)?,
        created_at: parse_datetime(&created),
        executed_at: executed.map(|e| parse_datetime(&e)),
    })
}

/// No rows is `false`; any other failure propagates
fn exists(result: rusqlite::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Filter for "does a live suggestion like this already exist?"
///
/// Every filter that is set must match.
#[derive(Debug, Clone)]
pub struct SuggestionMatch {
    pub user_id: i64,
    pub suggestion_type: SuggestionType,
    pub statuses: Vec<SuggestionStatus>,
    /// Same calendar day as `scheduled_at`
    pub scheduled_on: Option<NaiveDate>,
    pub content_hash: Option<String>,
    /// Only suggestions created at or after this instant
    pub created_since: Option<NaiveDateTime>,
    /// JSON path into `context_data` and the value it must equal
    pub context_field: Option<(String, String)>,
}

impl SuggestionMatch {
    /// Matches pending, accepted and snoozed suggestions of one type
    pub fn live(user_id: i64, suggestion_type: SuggestionType) -> Self {
        Self {
            user_id,
            suggestion_type,
            statuses: SuggestionStatus::LIVE.to_vec(),
            scheduled_on: None,
            content_hash: None,
            created_since: None,
            context_field: None,
        }
    }

    pub fn scheduled_on(mut self, date: NaiveDate) -> Self {
        self.scheduled_on = Some(date);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn created_since(mut self, since: NaiveDateTime) -> Self {
        self.created_since = Some(since);
        self
    }

    /// e.g. `context_eq("$.description", "Smart Fit")`
    pub fn context_eq(mut self, path: &str, value: impl Into<String>) -> Self {
        self.context_field = Some((path.to_string(), value.into()));
        self
    }
}

impl Database {
    pub fn has_active_suggestion(&self, m: &SuggestionMatch) -> Result<bool> {
        let conn = self.conn()?;

        let mut sql = String::from("SELECT 1 FROM suggestions WHERE user_id = ? AND type = ?");
        let mut args: Vec<Value> = vec![
            Value::Integer(m.user_id),
            Value::Text(m.suggestion_type.as_str().to_string()),
        ];

        if !m.statuses.is_empty() {
            let marks = vec!["?"; m.statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({})", marks));
            args.extend(
                m.statuses
                    .iter()
                    .map(|s| Value::Text(s.as_str().to_string())),
            );
        }
        if let Some(date) = m.scheduled_on {
            sql.push_str(" AND date(scheduled_at) = ?");
            args.push(Value::Text(format_date(date)));
        }
        if let Some(hash) = &m.content_hash {
            sql.push_str(" AND content_hash = ?");
            args.push(Value::Text(hash.clone()));
        }
        if let Some(since) = m.created_since {
            sql.push_str(" AND created_at >= ?");
            args.push(Value::Text(format_datetime(since)));
        }
        if let Some((path, value)) = &m.context_field {
            sql.push_str(" AND json_extract(context_data, ?) = ?");
            args.push(Value::Text(path.clone()));
            args.push(Value::Text(value.clone()));
        }
        sql.push_str(" LIMIT 1");

        exists(conn.query_row(&sql, params_from_iter(args.iter()), |_| Ok(())))
    }

    /// Exact content match against live (pending, accepted or snoozed)
    /// suggestions
    pub fn has_suggestion_with_content(&self, user_id: i64, content: &str) -> Result<bool> {
        let conn = self.conn()?;
        let [a, b, c] = SuggestionStatus::LIVE.map(|s| s.as_str());
        exists(conn.query_row(
            r#"
            SELECT 1 FROM suggestions
            WHERE user_id = ? AND content = ? AND status IN (?, ?, ?)
            LIMIT 1
            "#,
            params![user_id, content, a, b, c],
            |_| Ok(()),
        ))
    }

    /// Insert a draft as a pending suggestion.
    ///
    /// Returns `None` when an identical draft (same type, day and content)
    /// already exists for the user. The day is fixed at insert time so a
    /// later snooze never collides with it.
    pub fn insert_suggestion(
        &self,
        user_id: i64,
        draft: &SuggestionDraft,
        now: NaiveDateTime,
    ) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let context = draft.context_data()?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO suggestions (
                user_id, type, content, content_hash, priority, status,
                scheduled_at, scheduled_day, context_data, created_at
            ) VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?)
            "#,
            params![
                user_id,
                draft.suggestion_type.as_str(),
                draft.content,
                draft.content_hash(),
                draft.priority,
                format_datetime(draft.scheduled_date),
                format_date(draft.scheduled_date.date()),
                context,
                format_datetime(now),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    pub fn get_suggestion(&self, id: i64) -> Result<Option<Suggestion>> {
        let conn = self.conn()?;
        get_suggestion_on(&conn, id)
    }

    /// Highest priority first, then soonest scheduled
    pub fn list_suggestions(
        &self,
        user_id: i64,
        status: Option<SuggestionStatus>,
        limit: i64,
    ) -> Result<Vec<Suggestion>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM suggestions
            WHERE user_id = ? AND (? IS NULL OR status = ?)
            ORDER BY priority DESC, scheduled_at ASC, id ASC
            LIMIT ?
            "#,
            SUGGESTION_COLUMNS
        );
        let status = status.map(|s| s.as_str());
        let mut stmt = conn.prepare(&sql)?;
        let suggestions = stmt
            .query_map(params![user_id, status, status, limit], row_to_suggestion)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    /// Suggestions created at or after `since`, oldest first
    pub fn recent_suggestions(
        &self,
        user_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<Suggestion>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM suggestions WHERE user_id = ? AND created_at >= ? ORDER BY created_at ASC, id ASC",
            SUGGESTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let suggestions = stmt
            .query_map(params![user_id, format_datetime(since)], row_to_suggestion)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    /// Mark active suggestions scheduled before `cutoff` as expired.
    /// Returns how many were expired.
    pub fn expire_overdue_suggestions(
        &self,
        user_id: Option<i64>,
        cutoff: NaiveDateTime,
    ) -> Result<usize> {
        let conn = self.conn()?;
        let expired = conn.execute(
            r#"
            UPDATE suggestions SET status = 'expired'
            WHERE status IN ('pending', 'snoozed') AND scheduled_at < ?
            AND (? IS NULL OR user_id = ?)
            "#,
            params![format_datetime(cutoff), user_id, user_id],
        )?;
        Ok(expired)
    }
}

pub(super) fn get_suggestion_on(conn: &Connection, id: i64) -> Result<Option<Suggestion>> {
    let sql = format!("SELECT {} FROM suggestions WHERE id = ?", SUGGESTION_COLUMNS);
    match conn.query_row(&sql, params![id], row_to_suggestion) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move a suggestion to `next`, enforcing the one-way lifecycle.
///
/// Snoozing also pushes `scheduled_at` to `now + snooze_hours`.
pub(super) fn transition_on(
    conn: &Connection,
    suggestion: &Suggestion,
    next: SuggestionStatus,
    snooze_hours: Option<i64>,
    now: NaiveDateTime,
) -> Result<()> {
    if !suggestion.status.can_transition_to(next) {
        return Err(Error::InvalidTransition(format!(
            "suggestion {} is {} and cannot become {}",
            suggestion.id, suggestion.status, next
        )));
    }

    match next {
        SuggestionStatus::Snoozed => {
            let hours = snooze_hours.filter(|h| *h > 0).ok_or_else(|| {
                Error::InvalidTransition("snooze hours must be provided and positive".to_string())
            })?;
            conn.execute(
                "UPDATE suggestions SET status = ?, scheduled_at = ? WHERE id = ?",
                params![
                    next.as_str(),
                    format_datetime(now + Duration::hours(hours)),
                    suggestion.id
                ],
            )?;
        }
        SuggestionStatus::Executed => {
            conn.execute(
                "UPDATE suggestions SET status = ?, executed_at = ? WHERE id = ?",
                params![next.as_str(), format_datetime(now), suggestion.id],
            )?;
        }
        _ => {
            conn.execute(
                "UPDATE suggestions SET status = ? WHERE id = ?",
                params![next.as_str(), suggestion.id],
            )?;
        }
    }
    Ok(())
}
