//! JSON parsing for model responses
//!
//! Models often wrap the payload in prose or code fences, so the outermost
//! object (first `{` to last `}`) is extracted before decoding.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{SuggestionContext, SuggestionDraft, SuggestionType};

pub const GENERATED_BY: &str = "claude";
const DEFAULT_PRIORITY: i64 = 5;
const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Deserialize)]
struct RawBatch {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// The outermost `{...}` slice of a response
pub fn extract_json(response: &str) -> Result<&str> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::InvalidData(format!(
            "No JSON found in model response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

/// Decode a suggestion batch into drafts scheduled at `now`.
///
/// Entries with empty content are dropped. Priorities default to 5 and are
/// clamped into range.
pub fn parse_suggestions(
    response: &str,
    model: &str,
    now: NaiveDateTime,
) -> Result<Vec<SuggestionDraft>> {
    let json = extract_json(response)?;
    let batch: RawBatch = serde_json::from_str(json).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid suggestion JSON from model: {} | Raw: {}",
            e,
            truncate(json, 200)
        ))
    })?;

    let drafts = batch
        .suggestions
        .into_iter()
        .filter_map(|raw| {
            let content = raw.content.map(|c| c.trim().to_string())?;
            if content.is_empty() {
                return None;
            }
            let suggestion_type = SuggestionType::from_label(raw.kind.as_deref().unwrap_or(""));
            let priority = raw
                .priority
                .as_ref()
                .and_then(priority_value)
                .unwrap_or(DEFAULT_PRIORITY);
            let category = raw
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

            Some(SuggestionDraft::new(
                suggestion_type,
                content,
                priority,
                now,
                SuggestionContext::Generated {
                    reasoning: raw.reasoning.unwrap_or_default(),
                    generated_by: GENERATED_BY.to_string(),
                    model: model.to_string(),
                    category,
                },
            ))
        })
        .collect();

    Ok(drafts)
}

/// Integer priority from a number or numeric string
fn priority_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
