//! Suggestion statistics and the per-user dashboard

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDateTime};
use rusqlite::params;

use super::{format_datetime, Database};
use crate::analyzer::days_until_next_occurrence;
use crate::error::{Error, Result};
use crate::models::{DashboardStats, ImportantDate, Profile, SuggestionStats};

impl Database {
    pub fn suggestion_stats(&self, user_id: i64) -> Result<SuggestionStats> {
        let conn = self.conn()?;

        let mut stats = SuggestionStats::default();

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM suggestions WHERE user_id = ? GROUP BY status",
        )?;
        let by_status = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (status, count) in by_status {
            stats.total += count;
            match status.as_str() {
                "pending" => stats.pending = count,
                "accepted" => stats.accepted = count,
                "rejected" => stats.rejected = count,
                "executed" => stats.executed = count,
                _ => {}
            }
            stats.by_status.insert(status, count);
        }

        let mut stmt =
            conn.prepare("SELECT type, COUNT(*) FROM suggestions WHERE user_id = ? GROUP BY type")?;
        stats.by_type = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        if stats.total > 0 {
            let total = stats.total as f64;
            stats.acceptance_rate = (stats.accepted + stats.executed) as f64 / total;
            stats.execution_rate = stats.executed as f64 / total;
        }

        stats.average_hours_to_action = conn.query_row(
            r#"
            SELECT AVG((julianday(executed_at) - julianday(created_at)) * 24.0)
            FROM suggestions
            WHERE user_id = ? AND status = 'executed' AND executed_at IS NOT NULL
            "#,
            params![user_id],
            |row| row.get::<_, Option<f64>>(0),
        )?;

        Ok(stats)
    }

    pub fn dashboard_stats(&self, user_id: i64, now: NaiveDateTime) -> Result<DashboardStats> {
        let user = self
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;

        let days_active = (now.date() - user.created_at.date_naive()).num_days() + 1;

        let conn = self.conn()?;
        let pending_suggestions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM suggestions WHERE user_id = ? AND status = 'pending'",
            params![user_id],
            |row| row.get(0),
        )?;

        // Week starts on Monday
        let week_start = (now.date()
            - Duration::days(now.weekday().num_days_from_monday() as i64))
        .and_time(chrono::NaiveTime::MIN);
        let suggestions_this_week: i64 = conn.query_row(
            "SELECT COUNT(*) FROM suggestions WHERE user_id = ? AND created_at >= ?",
            params![user_id, format_datetime(week_start)],
            |row| row.get(0),
        )?;
        drop(conn);

        let acceptance_rate = self.suggestion_stats(user_id)?.acceptance_rate;

        let month_start = now
            .date()
            .with_day(1)
            .unwrap_or(now.date())
            .and_time(chrono::NaiveTime::MIN);
        let (transactions_this_month, spent_this_month) =
            self.spending_since(user_id, month_start)?;

        let next_important_date = self
            .get_profile(user_id)?
            .and_then(|p| next_important_date(&p, now));

        Ok(DashboardStats {
            days_active,
            pending_suggestions,
            suggestions_this_week,
            acceptance_rate,
            transactions_this_month,
            spent_this_month,
            last_activity: self.last_interaction_at(user_id)?,
            next_important_date,
        })
    }
}

/// The nearest upcoming birthday, the user's own or the spouse's
fn next_important_date(profile: &Profile, now: NaiveDateTime) -> Option<ImportantDate> {
    let today = now.date();
    let mut candidates = Vec::new();

    if let Some(birth) = profile.birth_date {
        let days = days_until_next_occurrence(birth, today);
        candidates.push(ImportantDate {
            date: today + Duration::days(days),
            kind: "birthday".to_string(),
            description: "Your birthday".to_string(),
        });
    }

    if let Some(spouse_birth) = profile.spouse_birth_date {
        let days = days_until_next_occurrence(spouse_birth, today);
        let description = match profile.spouse_name.as_deref() {
            Some(name) => format!("{}'s birthday", name),
            None => "Spouse's birthday".to_string(),
        };
        candidates.push(ImportantDate {
            date: today + Duration::days(days),
            kind: "anniversary".to_string(),
            description,
        });
    }

    candidates.into_iter().min_by_key(|c| c.date)
}
