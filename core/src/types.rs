//! Request and response DTOs for the generation and embedding endpoints.
//!
//! # Design
//! Requests are plain structs with public fields plus `with_*` helpers for
//! chaining. Unset optional fields are skipped on serialization, so the
//! payload sent to the server contains only what the caller chose. Empty
//! `options` maps and empty `stop` lists are treated as unset.
//!
//! Responses mirror the server's JSON field names. Everything except the
//! mandatory field is an `Option`; a field the server did not send stays
//! `None` and is omitted again when the response is re-serialized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorCause;

/// Serialize `value` into the key/value payload sent as a request body.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>, ErrorCause> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(ErrorCause::Serialization(<serde_json::Error as serde::ser::Error>::custom(format!(
            "request serialized to {} instead of a JSON object",
            json_kind(&other)
        )))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_unset_list(list: &Option<Vec<String>>) -> bool {
    list.as_ref().map_or(true, Vec::is_empty)
}

fn is_unset_options(options: &Option<GenerationOptions>) -> bool {
    options.as_ref().map_or(true, GenerationOptions::is_empty)
}

fn is_unset_map(map: &Option<Map<String, Value>>) -> bool {
    map.as_ref().map_or(true, Map::is_empty)
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Sampling and runtime parameters sent under `options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "is_unset_list")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<i64>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no option would be serialized.
    pub fn is_empty(&self) -> bool {
        self.seed.is_none()
            && self.num_predict.is_none()
            && self.top_k.is_none()
            && self.top_p.is_none()
            && self.min_p.is_none()
            && self.repeat_last_n.is_none()
            && self.temperature.is_none()
            && self.repeat_penalty.is_none()
            && is_unset_list(&self.stop)
            && self.num_ctx.is_none()
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_num_predict(mut self, num_predict: i64) -> Self {
        self.num_predict = Some(num_predict);
        self
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_min_p(mut self, min_p: f64) -> Self {
        self.min_p = Some(min_p);
        self
    }

    pub fn with_repeat_last_n(mut self, repeat_last_n: i64) -> Self {
        self.repeat_last_n = Some(repeat_last_n);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_repeat_penalty(mut self, repeat_penalty: f64) -> Self {
        self.repeat_penalty = Some(repeat_penalty);
        self
    }

    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = Some(stop.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_num_ctx(mut self, num_ctx: i64) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// `"json"` or a JSON schema object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think: Option<bool>,
    #[serde(default, skip_serializing_if = "is_unset_options")]
    pub options: Option<GenerationOptions>,
    /// Always sent; this client reads a single complete response.
    #[serde(default)]
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: None,
            suffix: None,
            format: None,
            think: None,
            options: None,
            stream: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<Value>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_think(mut self, think: bool) -> Self {
        self.think = Some(think);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn to_payload(&self) -> Result<Map<String, Value>, ErrorCause> {
        to_payload(self)
    }
}

/// Result of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Token context to pass back for conversational memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    /// Nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

impl GenerationResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            model: None,
            created_at: None,
            done: None,
            context: None,
            total_duration: None,
            load_duration: None,
            prompt_eval_count: None,
            prompt_eval_duration: None,
            eval_count: None,
            eval_duration: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Text to embed: one string or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl From<&str> for EmbeddingInput {
    fn from(value: &str) -> Self {
        EmbeddingInput::Single(value.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(value: String) -> Self {
        EmbeddingInput::Single(value)
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(value: Vec<String>) -> Self {
        EmbeddingInput::Batch(value)
    }
}

impl From<Vec<&str>> for EmbeddingInput {
    fn from(value: Vec<&str>) -> Self {
        EmbeddingInput::Batch(value.into_iter().map(str::to_string).collect())
    }
}

/// How long the server keeps the model loaded: a duration string such as
/// `"5m"` or a number of seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeepAlive {
    Duration(String),
    Seconds(i64),
}

impl From<&str> for KeepAlive {
    fn from(value: &str) -> Self {
        KeepAlive::Duration(value.to_string())
    }
}

impl From<String> for KeepAlive {
    fn from(value: String) -> Self {
        KeepAlive::Duration(value)
    }
}

impl From<i64> for KeepAlive {
    fn from(value: i64) -> Self {
        KeepAlive::Seconds(value)
    }
}

/// Body of `POST /api/embed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: EmbeddingInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<KeepAlive>,
    #[serde(default, skip_serializing_if = "is_unset_map")]
    pub options: Option<Map<String, Value>>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: impl Into<EmbeddingInput>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            keep_alive: None,
            options: None,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<KeepAlive>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn to_payload(&self) -> Result<Map<String, Value>, ErrorCause> {
        to_payload(self)
    }
}

/// Result of `POST /api/embed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One vector per input, in input order.
    pub embeddings: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
}

impl EmbeddingResponse {
    pub fn new(embeddings: Vec<Vec<f64>>) -> Self {
        Self {
            embeddings,
            model: None,
            total_duration: None,
            load_duration: None,
            prompt_eval_count: None,
        }
    }

    /// First vector, for single-input requests.
    pub fn embedding(&self) -> Option<&[f64]> {
        self.embeddings.first().map(Vec::as_slice)
    }

    /// Length of the first vector, 0 when there is none.
    pub fn dimension(&self) -> usize {
        self.embeddings.first().map_or(0, Vec::len)
    }

    pub fn count(&self) -> usize {
        self.embeddings.len()
    }
}
