//! Mock backend for testing
//!
//! Answers every request with a fixed text, or fails every request.
//! Prompts are recorded so tests can inspect what was sent.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{LlmBackend, LlmRequest};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct MockBackend {
    /// `None` makes every call fail
    response: Option<String>,
    model: String,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl MockBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            model: "mock".to_string(),
            requests: Arc::default(),
        }
    }

    /// A backend whose every call returns an error
    pub fn failing() -> Self {
        Self {
            response: None,
            model: "mock".to_string(),
            requests: Arc::default(),
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.response
            .clone()
            .ok_or_else(|| Error::Llm("mock backend configured to fail".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock"
    }
}
