//! Shared helpers for integration tests: an in-process mock of the Ollama
//! HTTP API and request/response plumbing for the gateway router.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use ollama_gateway::GatewayConfig;
use ollama_gateway::config::UpstreamTimeouts;

/// Canned reply for one mock endpoint.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Behaviour of every mock endpoint.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub generate: Reply,
    pub chat: Reply,
    pub tags: Reply,
    pub pull: Reply,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            generate: Reply::ok(json!({"response": "hello", "done": true})),
            chat: Reply::ok(json!({"message": {"role": "assistant", "content": "from chat"}})),
            tags: Reply::ok(json!({"models": [{"name": "llama3:latest"}]})),
            pull: Reply::ok(json!({"status": "pulling manifest"})),
        }
    }
}

#[derive(Default)]
struct Recorded {
    generate: Mutex<Vec<Value>>,
    chat: Mutex<Vec<Value>>,
    pull: Mutex<Vec<Value>>,
    tags: AtomicUsize,
}

struct MockState {
    config: MockConfig,
    recorded: Recorded,
}

/// Running mock model runner.
pub struct MockRunner {
    pub base_url: Url,
    state: Arc<MockState>,
}

impl MockRunner {
    pub fn generate_calls(&self) -> Vec<Value> {
        self.state.recorded.generate.lock().expect("lock").clone()
    }

    pub fn chat_calls(&self) -> Vec<Value> {
        self.state.recorded.chat.lock().expect("lock").clone()
    }

    pub fn pull_calls(&self) -> Vec<Value> {
        self.state.recorded.pull.lock().expect("lock").clone()
    }

    pub fn tags_calls(&self) -> usize {
        self.state.recorded.tags.load(Ordering::SeqCst)
    }
}

async fn respond(reply: &Reply) -> Response {
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    (
        reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body.clone(),
    )
        .into_response()
}

async fn mock_generate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.recorded.generate.lock().expect("lock").push(body);
    respond(&state.config.generate).await
}

async fn mock_chat(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.recorded.chat.lock().expect("lock").push(body);
    respond(&state.config.chat).await
}

async fn mock_pull(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.recorded.pull.lock().expect("lock").push(body);
    respond(&state.config.pull).await
}

async fn mock_tags(State(state): State<Arc<MockState>>) -> Response {
    state.recorded.tags.fetch_add(1, Ordering::SeqCst);
    respond(&state.config.tags).await
}

/// Start a mock model runner on an ephemeral local port.
pub async fn spawn_mock(config: MockConfig) -> MockRunner {
    let state = Arc::new(MockState {
        config,
        recorded: Recorded::default(),
    });

    let app = Router::new()
        .route("/api/generate", post(mock_generate))
        .route("/api/chat", post(mock_chat))
        .route("/api/pull", post(mock_pull))
        .route("/api/tags", get(mock_tags))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockRunner {
        base_url: Url::parse(&format!("http://{addr}")).expect("mock url"),
        state,
    }
}

/// URL of a local port nothing listens on.
pub fn unreachable_url() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    Url::parse(&format!("http://{addr}")).expect("probe url")
}

/// Short bounds so timeout tests finish quickly.
pub fn fast_timeouts() -> UpstreamTimeouts {
    UpstreamTimeouts::uniform(Duration::from_millis(300))
}

/// Gateway configuration pointed at `upstream`, staging uploads in `upload_dir`.
pub fn gateway_config(upstream: &Url, upload_dir: &Path) -> GatewayConfig {
    GatewayConfig::default()
        .with_upstream(upstream.clone())
        .with_upload_dir(upload_dir)
        .with_timeouts(fast_timeouts())
}

/// Send one request through the router and decode the JSON reply.
///
/// Non-JSON bodies come back as a JSON string.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn json_request(uri: &str, body: &Value) -> Request<Body> {
    raw_json_request(uri, body.to_string())
}

pub fn raw_json_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request")
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        bytes: &'a [u8],
    },
}

const BOUNDARY: &str = "gateway-test-boundary";

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

/// Number of entries left in `dir`.
pub fn entries_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read upload dir").count()
}
