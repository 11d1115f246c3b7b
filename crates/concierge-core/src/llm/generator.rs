//! LLM suggestion generator
//!
//! Loads recent transactions and suggestion history, renders the prompt,
//! and turns the model's JSON into drafts. `generate` is best-effort and
//! never fails; `generate_checked` surfaces the error for callers that
//! want to fall back.

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use super::parsing::parse_suggestions;
use super::prompt::{build_context, refine_prompt, suggestions_prompt, PromptContext};
use super::{LlmBackend, LlmClient, LlmRequest};
use crate::config::LlmSettings;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Profile, SuggestionDraft};

const REFINE_MAX_TOKENS: u32 = 200;
const REFINE_TEMPERATURE: f32 = 0.5;

pub struct LlmGenerator<'a> {
    db: &'a Database,
    settings: &'a LlmSettings,
    client: &'a LlmClient,
}

impl<'a> LlmGenerator<'a> {
    pub fn new(db: &'a Database, settings: &'a LlmSettings, client: &'a LlmClient) -> Self {
        Self {
            db,
            settings,
            client,
        }
    }

    /// Generate drafts, returning an empty list on any failure
    pub async fn generate(
        &self,
        user_id: i64,
        profile: Option<&Profile>,
        now: NaiveDateTime,
    ) -> Vec<SuggestionDraft> {
        match self.generate_checked(user_id, profile, now).await {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!(user_id, error = %e, "LLM generation failed");
                Vec::new()
            }
        }
    }

    /// Generate drafts, surfacing backend and parse errors
    pub async fn generate_checked(
        &self,
        user_id: i64,
        profile: Option<&Profile>,
        now: NaiveDateTime,
    ) -> Result<Vec<SuggestionDraft>> {
        let prompt = self.prompt_for(user_id, profile, now)?;

        debug!(
            user_id,
            model = %self.client.model(),
            host = %self.client.host(),
            "Requesting LLM suggestions"
        );
        let request = LlmRequest::new(prompt, self.settings.max_tokens, self.settings.temperature);
        let text = self.client.complete(&request).await?;

        let drafts = parse_suggestions(&text, self.client.model(), now)?;
        info!(user_id, count = drafts.len(), "LLM suggestions parsed");
        Ok(drafts)
    }

    /// The full prompt sent for `user_id` at `now`
    pub fn prompt_for(
        &self,
        user_id: i64,
        profile: Option<&Profile>,
        now: NaiveDateTime,
    ) -> Result<String> {
        let transactions = self.db.recent_transactions(
            user_id,
            now - Duration::days(self.settings.transaction_lookback_days),
            self.settings.transaction_limit,
        )?;
        let history = self
            .db
            .recent_suggestions(user_id, now - Duration::days(self.settings.history_days))?;

        let context = build_context(&PromptContext {
            profile,
            transactions: &transactions,
            recent_suggestions: &history,
            now,
        });
        Ok(suggestions_prompt(
            &context,
            self.settings.suggestions_requested,
        ))
    }
}

/// Rewrite a suggestion in light of user feedback. `None` on any failure.
pub async fn refine_suggestion(client: &LlmClient, content: &str, feedback: &str) -> Option<String> {
    let request = LlmRequest::new(
        refine_prompt(content, feedback),
        REFINE_MAX_TOKENS,
        REFINE_TEMPERATURE,
    );
    match client.complete(&request).await {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Suggestion refinement failed");
            None
        }
    }
}
