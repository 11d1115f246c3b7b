//! Suggestion engine
//!
//! Combines the rule-based and LLM generators for one user:
//! 1. Special-date rules always run
//! 2. LLM suggestions when enabled, else recurring-purchase rules
//!    (also the fallback when the LLM call fails)
//! 3. Drop types the user disabled, dedup on a content prefix,
//!    stable sort by priority, cap
//!
//! Persistence is separate (`persist_drafts`) and serialized per user.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::llm::{refine_suggestion, LlmClient, LlmGenerator};
use crate::models::{Preferences, Profile, ProfileUpdate, SuggestionDraft};
use crate::rules::RuleGenerator;

/// Outcome of a batch run over all active users
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub users: usize,
    pub inserted: usize,
    pub failed: usize,
}

/// A profile change and the suggestions it produced
#[derive(Debug, Clone)]
pub struct ProfileChange {
    pub profile: Profile,
    pub inserted: Vec<i64>,
}

pub struct SuggestionEngine {
    db: Database,
    config: EngineConfig,
    llm: Option<LlmClient>,
    user_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SuggestionEngine {
    /// Build an engine, creating the LLM client from `config` when enabled
    pub fn new(db: Database, config: EngineConfig) -> Result<Self> {
        let llm = LlmClient::from_config(&config)?;
        Ok(Self::with_llm(db, config, llm))
    }

    /// Build an engine with an explicit LLM client (or none)
    pub fn with_llm(db: Database, config: EngineConfig, llm: Option<LlmClient>) -> Self {
        Self {
            db,
            config,
            llm,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flag on, credential set, and a client present
    pub fn llm_active(&self) -> bool {
        self.config.llm_enabled() && self.llm.is_some()
    }

    pub async fn analyze_user(&self, user_id: i64) -> Result<Vec<SuggestionDraft>> {
        self.analyze_user_at(user_id, Utc::now().naive_utc()).await
    }

    /// Ranked drafts for `user_id` as of `now`. Nothing is persisted.
    pub async fn analyze_user_at(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<SuggestionDraft>> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        let profile = self.db.get_profile(user_id)?;

        let rules = RuleGenerator::new(&self.db, &self.config.rules)?;
        let mut drafts = rules.special_date_drafts(user_id, profile.as_ref(), now)?;

        let pattern = match self.llm.as_ref().filter(|_| self.config.llm_enabled()) {
            Some(client) => {
                let generator = LlmGenerator::new(&self.db, &self.config.llm, client);
                match generator
                    .generate_checked(user_id, profile.as_ref(), now)
                    .await
                {
                    Ok(generated) => generated,
                    Err(e) => {
                        warn!(
                            user = %user.username,
                            error = %e,
                            "LLM generation failed, falling back to rules"
                        );
                        rules.pattern_drafts(user_id, now)?
                    }
                }
            }
            None => rules.pattern_drafts(user_id, now)?,
        };
        drafts.extend(pattern);

        let preferences = profile.map(|p| p.preferences).unwrap_or_default();
        let drafts = filter_disabled(drafts, &preferences);
        let drafts = dedup_by_prefix(drafts, self.config.dedup_prefix_chars);
        let drafts = rank_and_limit(drafts, self.config.max_suggestions);

        debug!(user = %user.username, count = drafts.len(), "Analysis complete");
        Ok(drafts)
    }

    /// Insert drafts, skipping any whose exact content is already live
    /// (pending, accepted or snoozed). Returns the new suggestion ids.
    pub fn persist_drafts(
        &self,
        user_id: i64,
        drafts: &[SuggestionDraft],
        now: NaiveDateTime,
    ) -> Result<Vec<i64>> {
        let mut inserted = Vec::new();
        for draft in drafts {
            if self.db.has_suggestion_with_content(user_id, &draft.content)? {
                debug!(user_id, content = %draft.content, "Suggestion already exists");
                continue;
            }
            if let Some(id) = self.db.insert_suggestion(user_id, draft, now)? {
                inserted.push(id);
            }
        }
        Ok(inserted)
    }

    /// Analyze and persist, one run at a time per user
    pub async fn analyze_and_persist(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<i64>> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let drafts = self.analyze_user_at(user_id, now).await?;
        let inserted = self.persist_drafts(user_id, &drafts, now)?;
        info!(
            user_id,
            drafts = drafts.len(),
            inserted = inserted.len(),
            "Suggestions generated"
        );
        Ok(inserted)
    }

    /// Run every active user. A failing user is logged and counted; the
    /// batch carries on.
    pub async fn analyze_all(&self, now: NaiveDateTime) -> Result<BatchReport> {
        let users = self.db.list_users(true)?;
        let mut report = BatchReport {
            users: users.len(),
            ..Default::default()
        };

        for user in &users {
            match self.analyze_and_persist(user.id, now).await {
                Ok(ids) => report.inserted += ids.len(),
                Err(e) => {
                    warn!(user = %user.username, error = %e, "Analysis failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            users = report.users,
            inserted = report.inserted,
            failed = report.failed,
            "Batch analysis complete"
        );
        Ok(report)
    }

    /// Apply a profile update, then regenerate suggestions for the user.
    /// A failed regeneration is logged and does not undo the update.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
        now: NaiveDateTime,
    ) -> Result<ProfileChange> {
        let profile = self.db.update_profile(user_id, update, now)?;
        let inserted = if update.is_empty() {
            Vec::new()
        } else {
            self.regenerate(user_id, now).await
        };
        Ok(ProfileChange { profile, inserted })
    }

    /// Replace preferences, then regenerate suggestions for the user
    pub async fn update_preferences(
        &self,
        user_id: i64,
        preferences: &Preferences,
        now: NaiveDateTime,
    ) -> Result<ProfileChange> {
        self.db.update_preferences(user_id, preferences, now)?;
        let profile = self
            .db
            .get_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)))?;
        let inserted = self.regenerate(user_id, now).await;
        Ok(ProfileChange { profile, inserted })
    }

    /// Reworded suggestion text given user feedback. `None` when the LLM is
    /// not configured or the call fails. The stored suggestion is unchanged.
    pub async fn refine(
        &self,
        user_id: i64,
        suggestion_id: i64,
        feedback: &str,
    ) -> Result<Option<String>> {
        let suggestion = self
            .db
            .get_suggestion(suggestion_id)?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", suggestion_id)))?;

        let Some(client) = self.llm.as_ref().filter(|_| self.config.llm_enabled()) else {
            debug!(suggestion_id, "Refinement skipped, LLM not configured");
            return Ok(None);
        };
        Ok(refine_suggestion(client, &suggestion.content, feedback).await)
    }

    async fn regenerate(&self, user_id: i64, now: NaiveDateTime) -> Vec<i64> {
        match self.analyze_and_persist(user_id, now).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(user_id, error = %e, "Analysis after profile change failed");
                Vec::new()
            }
        }
    }

    async fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }
}

/// Drop drafts whose type the user switched off
pub fn filter_disabled(drafts: Vec<SuggestionDraft>, preferences: &Preferences) -> Vec<SuggestionDraft> {
    drafts
        .into_iter()
        .filter(|d| preferences.allows(d.suggestion_type))
        .collect()
}

/// Keep the first draft for each case-insensitive content prefix of
/// `prefix_chars` characters
pub fn dedup_by_prefix(drafts: Vec<SuggestionDraft>, prefix_chars: usize) -> Vec<SuggestionDraft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|d| {
            let key = d
                .content
                .chars()
                .take(prefix_chars)
                .collect::<String>()
                .to_lowercase();
            seen.insert(key)
        })
        .collect()
}

/// Stable sort by priority, highest first, then truncate
pub fn rank_and_limit(mut drafts: Vec<SuggestionDraft>, max: usize) -> Vec<SuggestionDraft> {
    drafts.sort_by(|a, b| b.priority.cmp(&a.priority));
    drafts.truncate(max);
    drafts
}
