//! Anthropic Messages API backend
//!
//! Sends a single user message to `{base_url}/v1/messages` and returns the
//! text of the first text block in the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmBackend, LlmRequest};
use crate::config::LlmSettings;
use crate::error::{Error, Result};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Message<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Content block types. Anything other than text is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Anthropic Messages API response (fields we read)
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Text of the first text block
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

#[derive(Clone)]
pub struct AnthropicBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a backend with a bounded request timeout
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_settings(settings: &LlmSettings, api_key: &str) -> Result<Self> {
        Self::new(
            &settings.base_url,
            api_key,
            &settings.model,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// Create a new backend with a different model (same host and key)
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: model.to_string(),
        }
    }

    /// Send a messages request and decode the response
    pub async fn messages(&self, request: &LlmRequest) -> Result<MessagesResponse> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            "Sending Messages API request"
        );

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!(
                "Anthropic API error ({}): {}",
                status, body
            )));
        }

        let messages_response: MessagesResponse = response.json().await?;

        debug!(
            stop_reason = ?messages_response.stop_reason,
            blocks = messages_response.content.len(),
            "Received Messages API response"
        );

        Ok(messages_response)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        let response = self.messages(request).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| Error::Llm("No text in response".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
