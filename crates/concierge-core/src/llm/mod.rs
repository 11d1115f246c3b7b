//! Language-model backends for suggestion generation
//!
//! # Architecture
//!
//! - `LlmBackend` trait: a single text-completion call
//! - `LlmClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `AnthropicBackend` (Messages API), `MockBackend`
//! - `LlmGenerator`: builds the user context, calls the backend, parses drafts
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = EngineConfig::from_env()?;
//! if let Some(client) = LlmClient::from_config(&config)? {
//!     let generator = LlmGenerator::new(&db, &config.llm, &client);
//!     let drafts = generator.generate(user_id, profile.as_ref(), now).await;
//! }
//! ```
//!
//! # Configuration
//!
//! The client is only built when `EngineConfig::llm_enabled()` holds, which
//! needs both `use_llm` and a non-empty `ANTHROPIC_API_KEY`.

pub mod anthropic;
mod generator;
mod mock;
pub mod parsing;
pub mod prompt;

pub use anthropic::AnthropicBackend;
pub use generator::{refine_suggestion, LlmGenerator};
pub use mock::MockBackend;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::Result;

/// One completion request: a single user message
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }
}

/// Trait implemented by every completion backend
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send the prompt and return the response text
    async fn complete(&self, request: &LlmRequest) -> Result<String>;

    /// Model name (recorded in generated contexts)
    fn model(&self) -> &str;

    /// Base URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete LLM client enum
#[derive(Clone)]
pub enum LlmClient {
    /// Anthropic Messages API
    Anthropic(AnthropicBackend),
    /// Canned responses for tests
    Mock(MockBackend),
}

impl LlmClient {
    /// Build the configured client, or `None` when the LLM path is disabled
    /// or no credential is set
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>> {
        if !config.llm_enabled() {
            return Ok(None);
        }
        let Some(api_key) = config.api_key.as_deref() else {
            return Ok(None);
        };
        let backend = AnthropicBackend::from_settings(&config.llm, api_key)?;
        Ok(Some(LlmClient::Anthropic(backend)))
    }

    /// Create a mock client that answers every request with `response`
    pub fn mock(response: impl Into<String>) -> Self {
        LlmClient::Mock(MockBackend::new(response))
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            LlmClient::Anthropic(b) => LlmClient::Anthropic(b.with_model(model)),
            LlmClient::Mock(b) => LlmClient::Mock(b.with_model(model)),
        }
    }
}

// Implement LlmBackend for LlmClient by delegating to the inner backend
#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        match self {
            LlmClient::Anthropic(b) => b.complete(request).await,
            LlmClient::Mock(b) => b.complete(request).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            LlmClient::Anthropic(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            LlmClient::Anthropic(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}
