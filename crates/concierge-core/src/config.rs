//! Engine configuration
//!
//! Built from defaults, then optionally overlaid with a TOML file and/or
//! environment variables. The resulting struct is passed explicitly to
//! [`crate::engine::SuggestionEngine`]; nothing reads settings globally.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default Anthropic endpoint (the `/v1/messages` path is appended)
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";

pub const DEFAULT_LLM_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Upper bound for day-valued settings (about a century)
const MAX_DAYS: i64 = 36_500;

/// Settings for the LLM-backed generator
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Requests taking longer than this count as failures
    pub timeout_secs: u64,
    /// How many suggestions to ask the model for
    pub suggestions_requested: usize,
    /// Transaction lookback for the prompt context
    pub transaction_lookback_days: i64,
    pub transaction_limit: i64,
    /// Suggestion history lookback for the prompt context
    pub history_days: i64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 30,
            suggestions_requested: 5,
            transaction_lookback_days: 90,
            transaction_limit: 50,
            history_days: 30,
        }
    }
}

/// Thresholds for the pattern analyzer and rule-based generator
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSettings {
    /// Spouse birthday fires when 0 < days_until <= this
    pub spouse_window_days: i64,
    /// Own birthday fires only when days_until == this
    pub self_window_days: i64,
    /// Spouse birthday at or inside this many days is HIGH, otherwise MEDIUM
    pub high_priority_window_days: i64,
    /// Lookback for recurring purchases
    pub recurrence_window_days: i64,
    /// Minimum occurrences for a (category, description) group to count
    pub min_occurrences: u32,
    /// A group is due once days_since_last >= average_interval - slack
    pub due_slack_days: f64,
    /// How many past years to search around a special date
    pub co_occurrence_years: i32,
    /// Days either side of the special date in each past year
    pub co_occurrence_window_days: i64,
    pub co_occurrence_category: String,
    /// Distinct years a place must appear in before it is suggested
    pub co_occurrence_min_years: usize,
    /// Matching purchases needed for a gift suggestion
    pub affinity_min_count: usize,
    /// Store-level duplicate lookback for content fingerprints
    pub dedup_lookback_days: i64,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            spouse_window_days: 7,
            self_window_days: 1,
            high_priority_window_days: 3,
            recurrence_window_days: 180,
            min_occurrences: 3,
            due_slack_days: 3.0,
            co_occurrence_years: 3,
            co_occurrence_window_days: 3,
            co_occurrence_category: "restaurant".to_string(),
            co_occurrence_min_years: 2,
            affinity_min_count: 2,
            dedup_lookback_days: 7,
        }
    }
}

/// Everything the suggestion engine needs to decide what to run
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Feature flag for the LLM path. Also requires `api_key`.
    pub use_llm: bool,
    pub api_key: Option<String>,
    pub llm: LlmSettings,
    pub rules: RuleSettings,
    /// Leading characters compared (case-insensitively) when deduplicating drafts
    pub dedup_prefix_chars: usize,
    /// Cap on drafts returned per analysis
    pub max_suggestions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            api_key: None,
            llm: LlmSettings::default(),
            rules: RuleSettings::default(),
            dedup_prefix_chars: 50,
            max_suggestions: 10,
        }
    }
}

impl EngineConfig {
    /// Rule-based only, regardless of credentials
    pub fn rules_only() -> Self {
        Self {
            use_llm: false,
            ..Self::default()
        }
    }

    /// True when the flag is on and a non-empty credential is configured
    pub fn llm_enabled(&self) -> bool {
        self.use_llm && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut config = Self::default();
        config.apply_toml(&content)?;
        Ok(config)
    }

    /// Overlay values from a variable lookup (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CONCIERGE_USE_LLM") {
            self.use_llm = parse_bool("CONCIERGE_USE_LLM", &v)?;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(v) = lookup("CONCIERGE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("CONCIERGE_LLM_MODEL") {
            self.llm.model = v;
        }
        parse_into(&lookup, "CONCIERGE_LLM_MAX_TOKENS", &mut self.llm.max_tokens)?;
        parse_into(&lookup, "CONCIERGE_LLM_TEMPERATURE", &mut self.llm.temperature)?;
        parse_into(&lookup, "CONCIERGE_LLM_TIMEOUT_SECS", &mut self.llm.timeout_secs)?;
        parse_into(
            &lookup,
            "CONCIERGE_SPOUSE_WINDOW_DAYS",
            &mut self.rules.spouse_window_days,
        )?;
        parse_into(
            &lookup,
            "CONCIERGE_SELF_WINDOW_DAYS",
            &mut self.rules.self_window_days,
        )?;
        parse_into(
            &lookup,
            "CONCIERGE_RECURRENCE_WINDOW_DAYS",
            &mut self.rules.recurrence_window_days,
        )?;
        parse_into(
            &lookup,
            "CONCIERGE_DEDUP_PREFIX_CHARS",
            &mut self.dedup_prefix_chars,
        )?;
        parse_into(&lookup, "CONCIERGE_MAX_SUGGESTIONS", &mut self.max_suggestions)?;
        self.validate()
    }

    /// Overlay values present in a TOML document
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        if let Some(engine) = raw.engine {
            if let Some(v) = engine.use_llm {
                self.use_llm = v;
            }
            if let Some(v) = engine.dedup_prefix_chars {
                self.dedup_prefix_chars = v;
            }
            if let Some(v) = engine.max_suggestions {
                self.max_suggestions = v;
            }
        }

        if let Some(llm) = raw.llm {
            let s = &mut self.llm;
            if let Some(v) = llm.base_url {
                s.base_url = v;
            }
            if let Some(v) = llm.model {
                s.model = v;
            }
            if let Some(v) = llm.max_tokens {
                s.max_tokens = v;
            }
            if let Some(v) = llm.temperature {
                s.temperature = v;
            }
            if let Some(v) = llm.timeout_secs {
                s.timeout_secs = v;
            }
            if let Some(v) = llm.suggestions_requested {
                s.suggestions_requested = v;
            }
        }

        if let Some(rules) = raw.rules {
            let s = &mut self.rules;
            if let Some(v) = rules.spouse_window_days {
                s.spouse_window_days = v;
            }
            if let Some(v) = rules.self_window_days {
                s.self_window_days = v;
            }
            if let Some(v) = rules.high_priority_window_days {
                s.high_priority_window_days = v;
            }
            if let Some(v) = rules.recurrence_window_days {
                s.recurrence_window_days = v;
            }
            if let Some(v) = rules.min_occurrences {
                s.min_occurrences = v;
            }
            if let Some(v) = rules.due_slack_days {
                s.due_slack_days = v;
            }
            if let Some(v) = rules.dedup_lookback_days {
                s.dedup_lookback_days = v;
            }
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.rules.recurrence_window_days <= 0 {
            return Err(Error::Config(
                "recurrence_window_days must be positive".to_string(),
            ));
        }
        for (key, days) in [
            ("recurrence_window_days", self.rules.recurrence_window_days),
            ("dedup_lookback_days", self.rules.dedup_lookback_days),
            ("co_occurrence_window_days", self.rules.co_occurrence_window_days),
            ("transaction_lookback_days", self.llm.transaction_lookback_days),
            ("history_days", self.llm.history_days),
        ] {
            if !(0..=MAX_DAYS).contains(&days) {
                return Err(Error::Config(format!(
                    "{} must be between 0 and {} days",
                    key, MAX_DAYS
                )));
            }
        }
        if !(0..=100).contains(&self.rules.co_occurrence_years) {
            return Err(Error::Config(
                "co_occurrence_years must be between 0 and 100".to_string(),
            ));
        }
        if self.rules.min_occurrences == 0 {
            return Err(Error::Config("min_occurrences must be at least 1".to_string()));
        }
        if self.dedup_prefix_chars == 0 {
            return Err(Error::Config(
                "dedup_prefix_chars must be at least 1".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{} is not a boolean: {}", key, other))),
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw)))?;
    }
    Ok(())
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    engine: Option<RawEngine>,
    llm: Option<RawLlm>,
    rules: Option<RawRules>,
}

#[derive(Debug, Deserialize)]
struct RawEngine {
    use_llm: Option<bool>,
    dedup_prefix_chars: Option<usize>,
    max_suggestions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawLlm {
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    suggestions_requested: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawRules {
    spouse_window_days: Option<i64>,
    self_window_days: Option<i64>,
    high_priority_window_days: Option<i64>,
    recurrence_window_days: Option<i64>,
    min_occurrences: Option<u32>,
    due_slack_days: Option<f64>,
    dedup_lookback_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.rules.spouse_window_days, 7);
        assert_eq!(config.rules.self_window_days, 1);
        assert_eq!(config.dedup_prefix_chars, 50);
        assert_eq!(config.max_suggestions, 10);
        assert_eq!(config.llm.timeout_secs, 30);
        // No credential, so the flag alone is not enough
        assert!(!config.llm_enabled());
    }

    #[test]
    fn test_llm_enabled_needs_flag_and_key() {
        let mut config = EngineConfig::default();
        config.api_key = Some("sk-test".to_string());
        assert!(config.llm_enabled());

        config.use_llm = false;
        assert!(!config.llm_enabled());

        config.use_llm = true;
        config.api_key = Some("   ".to_string());
        assert!(!config.llm_enabled());
    }

    #[test]
    fn test_apply_env() {
        let mut config = EngineConfig::default();
        config
            .apply_env(lookup(&[
                ("CONCIERGE_USE_LLM", "false"),
                ("ANTHROPIC_API_KEY", "sk-abc"),
                ("CONCIERGE_LLM_MODEL", "claude-test"),
                ("CONCIERGE_SPOUSE_WINDOW_DAYS", "10"),
                ("CONCIERGE_DEDUP_PREFIX_CHARS", "80"),
            ]))
            .unwrap();

        assert!(!config.use_llm);
        assert_eq!(config.api_key.as_deref(), Some("sk-abc"));
        assert_eq!(config.llm.model, "claude-test");
        assert_eq!(config.rules.spouse_window_days, 10);
        assert_eq!(config.dedup_prefix_chars, 80);
    }

    #[test]
    fn test_apply_env_rejects_garbage() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(lookup(&[("CONCIERGE_MAX_SUGGESTIONS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = config
            .apply_env(lookup(&[("CONCIERGE_USE_LLM", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[engine]
use_llm = false
max_suggestions = 5

[llm]
model = "claude-small"
timeout_secs = 10

[rules]
spouse_window_days = 14
due_slack_days = 1.5
"#
        )
        .unwrap();

        let config = EngineConfig::from_toml_file(file.path()).unwrap();
        assert!(!config.use_llm);
        assert_eq!(config.max_suggestions, 5);
        assert_eq!(config.llm.model, "claude-small");
        assert_eq!(config.llm.timeout_secs, 10);
        assert_eq!(config.rules.spouse_window_days, 14);
        assert_eq!(config.rules.due_slack_days, 1.5);
        // Untouched values keep defaults
        assert_eq!(config.rules.self_window_days, 1);
        assert_eq!(config.dedup_prefix_chars, 50);
    }

    #[test]
    fn test_toml_validation() {
        let mut config = EngineConfig::default();
        assert!(config.apply_toml("[engine]\ndedup_prefix_chars = 0").is_err());
        assert!(config.apply_toml("not toml [").is_err());
    }

    #[test]
    fn test_day_settings_are_bounded() {
        let mut config = EngineConfig::default();
        assert!(config
            .apply_toml("[rules]\ndedup_lookback_days = 9223372036854775807")
            .is_err());

        let mut config = EngineConfig::default();
        assert!(config
            .apply_toml("[rules]\nrecurrence_window_days = 36501")
            .is_err());

        let mut config = EngineConfig::default();
        assert!(config
            .apply_toml("[rules]\nrecurrence_window_days = 36500\ndedup_lookback_days = 0")
            .is_ok());

        let mut config = EngineConfig::default();
        assert!(config
            .apply_env(lookup(&[(
                "CONCIERGE_RECURRENCE_WINDOW_DAYS",
                "9223372036854775807"
            )]))
            .is_err());
    }
}
