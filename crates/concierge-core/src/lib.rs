//! Concierge Core Library
//!
//! Proactive suggestion engine for a personal-finance assistant:
//! - Database access and migrations (users, profiles, transactions, suggestions)
//! - Pattern analyzer for special dates, recurring purchases, co-occurrences
//! - Rule-based suggestion generator
//! - LLM suggestion generator over the Anthropic Messages API
//! - Engine that merges, deduplicates, ranks and persists drafts

pub mod analyzer;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod llm;
pub mod models;
pub mod rules;

/// Test utilities including a mock LLM server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{EngineConfig, LlmSettings, RuleSettings};
pub use db::{Database, SuggestionMatch};
pub use engine::{BatchReport, ProfileChange, SuggestionEngine};
pub use error::{Error, Result};
pub use llm::{AnthropicBackend, LlmBackend, LlmClient, LlmGenerator, LlmRequest, MockBackend};
pub use rules::RuleGenerator;
