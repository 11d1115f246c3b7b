//! Profile and preference operations
//!
//! Every change is audited as a zero-amount `system` transaction in the
//! same database transaction as the update itself.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rusqlite::params;
use serde_json::json;
use tracing::debug;

use super::transactions::insert_transaction_on;
use super::{format_date, parse_date, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Preferences, Profile, ProfileUpdate, TransactionType};

pub const PROFILE_UPDATE_CATEGORY: &str = "profile_update";
pub const PREFERENCES_UPDATE_CATEGORY: &str = "preferences_update";

impl Database {
    pub fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r#"
            SELECT user_id, name, phone, birth_date, spouse_name, spouse_birth_date, preferences
            FROM profiles WHERE user_id = ?
            "#,
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        );

        let (user_id, name, phone, birth, spouse_name, spouse_birth, prefs) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A corrupt preferences blob should not hide the profile
        let preferences = prefs
            .and_then(|p| serde_json::from_str(&p).ok())
            .unwrap_or_default();

        Ok(Some(Profile {
            user_id,
            name,
            phone,
            birth_date: parse_date(birth),
            spouse_name,
            spouse_birth_date: parse_date(spouse_birth),
            preferences,
        }))
    }

    /// Apply a profile update and audit it. Returns the updated profile.
    pub fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
        now: NaiveDateTime,
    ) -> Result<Profile> {
        if update.is_empty() {
            return self
                .get_profile(user_id)?
                .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // COALESCE keeps fields the update leaves out
        let updated = tx.execute(
            r#"
            UPDATE profiles SET
                name = COALESCE(?, name),
                phone = COALESCE(?, phone),
                birth_date = COALESCE(?, birth_date),
                spouse_name = COALESCE(?, spouse_name),
                spouse_birth_date = COALESCE(?, spouse_birth_date),
                updated_at = ?
            WHERE user_id = ?
            "#,
            params![
                update.name,
                update.phone,
                update.birth_date.map(format_date),
                update.spouse_name,
                update.spouse_birth_date.map(format_date),
                super::format_datetime(now),
                user_id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("profile for user {}", user_id)));
        }

        let fields = update.changed_fields();
        insert_transaction_on(
            &tx,
            &audit_record(user_id, PROFILE_UPDATE_CATEGORY, "Profile updated", &fields, now),
        )?;
        tx.commit()?;

        debug!(user_id, ?fields, "Profile updated");

        self.get_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)))
    }

    /// Replace preferences and audit the change
    pub fn update_preferences(
        &self,
        user_id: i64,
        preferences: &Preferences,
        now: NaiveDateTime,
    ) -> Result<()> {
        let json = serde_json::to_string(preferences)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE profiles SET preferences = ?, updated_at = ? WHERE user_id = ?",
            params![json, super::format_datetime(now), user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("profile for user {}", user_id)));
        }

        insert_transaction_on(
            &tx,
            &audit_record(
                user_id,
                PREFERENCES_UPDATE_CATEGORY,
                "Preferences updated",
                &["preferences"],
                now,
            ),
        )?;
        tx.commit()?;

        Ok(())
    }
}

fn audit_record(
    user_id: i64,
    category: &str,
    description: &str,
    fields: &[&str],
    now: NaiveDateTime,
) -> NewTransaction {
    NewTransaction {
        user_id,
        amount: Decimal::ZERO,
        transaction_type: TransactionType::System,
        category: category.to_string(),
        description: description.to_string(),
        date: now,
        location: None,
        metadata: Some(json!({ "fields": fields })),
    }
}
