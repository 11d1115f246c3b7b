//! Test utilities for concierge-core
//!
//! Provides a mock Anthropic Messages API server for integration tests.
//! It answers `POST /v1/messages` with either a canned text reply or a
//! fixed error status, and records the requests it received.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// A request as seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub api_key: Option<String>,
    pub anthropic_version: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Status(StatusCode, String),
}

#[derive(Clone)]
struct ServerState {
    reply: Reply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Mock Messages API server on an ephemeral local port
pub struct MockLlmServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Answer every request with a single text block
    pub async fn with_text(text: impl Into<String>) -> Self {
        Self::start(Reply::Text(text.into())).await
    }

    /// Answer every request with `status` and an error body
    pub async fn with_status(status: StatusCode) -> Self {
        let body = json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })
        .to_string();
        Self::start(Reply::Status(status, body)).await
    }

    async fn start(reply: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            reply,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/v1/messages", post(handle_messages))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_messages(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        api_key: header("x-api-key"),
        anthropic_version: header("anthropic-version"),
        body: body.clone(),
    });

    match state.reply {
        Reply::Text(text) => Json(json!({
            "id": "msg_mock",
            "type": "message",
            "role": "assistant",
            "model": body.get("model").cloned().unwrap_or(Value::Null),
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 10, "output_tokens": 10}
        }))
        .into_response(),
        Reply::Status(status, body) => (status, body).into_response(),
    }
}
