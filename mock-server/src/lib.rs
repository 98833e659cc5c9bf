//! In-process fake of the Ollama HTTP API.
//!
//! # Design
//! Serves `POST /api/generate`, `POST /api/embed` and `GET /api/version`
//! with canned, Ollama-shaped JSON. Every request is recorded verbatim
//! (method, path, query, headers of interest, raw body) so client tests can
//! assert on exactly what went over the wire. A test can also force the next
//! replies to a fixed status/body, or delay them to trip client timeouts.
//!
//! State sits behind a std `Mutex`: handlers hold the lock only to copy data
//! in or out, and test threads read it without an async runtime.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// One request as received by the mock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// Body parsed as JSON, `None` when empty or invalid.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<RecordedRequest>,
    scripted: Option<(u16, String)>,
    delay: Option<Duration>,
}

/// Handle to a mock server's shared state. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct MockOllama {
    state: Arc<Mutex<MockState>>,
}

impl MockOllama {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/generate", post(generate))
            .route("/api/embed", post(embed))
            .route("/api/version", get(version))
            .with_state(self.clone())
    }

    /// Answer every following request with `status` and `body`.
    pub fn respond_with(&self, status: u16, body: impl Into<String>) {
        self.lock().scripted = Some((status, body.into()));
    }

    /// Go back to the canned replies.
    pub fn clear_script(&self) {
        self.lock().scripted = None;
    }

    /// Wait `delay` before answering every following request.
    pub fn delay_responses(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // Ignore poisoning left by a panicked test thread.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, method: &Method, uri: &Uri, headers: &HeaderMap, body: &str) {
        let value_of = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let request = RecordedRequest {
            method: method.as_str().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            content_type: value_of(header::CONTENT_TYPE),
            accept: value_of(header::ACCEPT),
            body: body.to_string(),
        };
        tracing::debug!(method = %request.method, path = %request.path, "recorded request");
        self.lock().requests.push(request);
    }

    /// Apply the configured delay, then return the scripted reply if any.
    async fn scripted(&self) -> Option<Response> {
        let (delay, scripted) = {
            let state = self.lock();
            (state.delay, state.scripted.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        scripted.map(|(status, body)| {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, body).into_response()
        })
    }
}

/// Subset of the generate request the mock looks at.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub model: Option<String>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

/// Subset of the embed request the mock looks at.
#[derive(Debug, Deserialize)]
pub struct EmbedBody {
    pub model: Option<String>,
    pub input: Option<EmbedInput>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EmbedInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbedInput {
    fn texts(&self) -> Vec<&str> {
        match self {
            EmbedInput::Single(text) => vec![text.as_str()],
            EmbedInput::Batch(texts) => texts.iter().map(String::as_str).collect(),
        }
    }
}

/// Deterministic 4-dimensional vector for `text`.
pub fn fake_embedding(text: &str) -> Vec<f64> {
    let len = text.chars().count() as f64;
    let sum: u32 = text.bytes().map(u32::from).sum();
    vec![len, f64::from(sum % 97) / 97.0, 0.5, -0.5]
}

fn json_reply(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

fn error_reply(status: StatusCode, message: &str) -> Response {
    json_reply(status, json!({ "error": message }))
}

async fn generate(
    State(mock): State<MockOllama>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    if let Some(reply) = mock.scripted().await {
        return reply;
    }

    let input: GenerateBody = match serde_json::from_str(&body) {
        Ok(input) => input,
        Err(e) => return error_reply(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let Some(model) = input.model.filter(|m| !m.is_empty()) else {
        return error_reply(StatusCode::BAD_REQUEST, "model is required");
    };
    if input.stream {
        return error_reply(StatusCode::BAD_REQUEST, "streaming is not supported by the mock");
    }

    let prompt = input.prompt.unwrap_or_default();
    json_reply(
        StatusCode::OK,
        json!({
            "model": model,
            "created_at": "2024-01-01T00:00:00Z",
            "response": format!("Echo: {prompt}"),
            "done": true,
            "context": [1, 2, 3],
            "total_duration": 5_000_000_u64,
            "load_duration": 1_000_000_u64,
            "prompt_eval_count": prompt.split_whitespace().count(),
            "prompt_eval_duration": 100_000_u64,
            "eval_count": 2,
            "eval_duration": 200_000_u64
        }),
    )
}

async fn embed(
    State(mock): State<MockOllama>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    if let Some(reply) = mock.scripted().await {
        return reply;
    }

    let input: EmbedBody = match serde_json::from_str(&body) {
        Ok(input) => input,
        Err(e) => return error_reply(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let Some(model) = input.model.filter(|m| !m.is_empty()) else {
        return error_reply(StatusCode::BAD_REQUEST, "model is required");
    };
    let texts = input.input.as_ref().map(EmbedInput::texts).unwrap_or_default();
    let embeddings: Vec<Vec<f64>> = texts.iter().map(|text| fake_embedding(text)).collect();

    json_reply(
        StatusCode::OK,
        json!({
            "model": model,
            "embeddings": embeddings,
            "total_duration": 14_143_917_u64,
            "load_duration": 1_019_500_u64,
            "prompt_eval_count": texts.len()
        }),
    )
}

async fn version(
    State(mock): State<MockOllama>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    mock.record(&method, &uri, &headers, "");
    if let Some(reply) = mock.scripted().await {
        return reply;
    }
    json_reply(StatusCode::OK, json!({ "version": "0.0.0-mock" }))
}

/// Router backed by a fresh, unshared mock.
pub fn app() -> Router {
    MockOllama::new().router()
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, MockOllama::new()).await
}

pub async fn serve(listener: TcpListener, mock: MockOllama) -> Result<(), std::io::Error> {
    axum::serve(listener, mock.router()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_embedding_is_deterministic() {
        assert_eq!(fake_embedding("Hello"), fake_embedding("Hello"));
        assert_eq!(fake_embedding("Hello").len(), 4);
        assert_eq!(fake_embedding("Hello")[0], 5.0);
    }

    #[test]
    fn embed_input_accepts_string_or_list() {
        let single: EmbedBody = serde_json::from_str(r#"{"model":"m","input":"a"}"#).unwrap();
        assert_eq!(single.input.unwrap().texts(), vec!["a"]);

        let batch: EmbedBody = serde_json::from_str(r#"{"model":"m","input":["a","b"]}"#).unwrap();
        assert_eq!(batch.input.unwrap().texts(), vec!["a", "b"]);
    }

    #[test]
    fn generate_body_defaults_stream_to_false() {
        let body: GenerateBody = serde_json::from_str(r#"{"model":"m"}"#).unwrap();
        assert!(!body.stream);
        assert!(body.prompt.is_none());
    }

    #[test]
    fn recorded_request_parses_json_body() {
        let req = RecordedRequest {
            method: "POST".to_string(),
            path: "/api/generate".to_string(),
            query: None,
            content_type: None,
            accept: None,
            body: r#"{"model":"m"}"#.to_string(),
        };
        assert_eq!(req.json(), Some(json!({"model": "m"})));
    }
}
