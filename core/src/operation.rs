//! The request → response round trip shared by every operation client.
//!
//! # Design
//! Generation and embedding run the same sequence: serialize, post, check
//! status, decode, validate the one mandatory field, fill in the optional
//! metadata. `execute` implements it once; an `Operation` impl supplies the
//! endpoint, the wording of its error messages, and the mapping from the
//! decoded payload to its typed response.
//!
//! Every failure leaves `execute` as an `OperationError<O>`:
//! - `TransportError` → "Transport error during …", transport code kept;
//! - non-2xx → "… failed with status code …", HTTP status kept;
//! - anything else (request serialization, invalid JSON) → "Unexpected
//!   error during …", code 0.
//!
//! Mandatory-field failures come straight from `build_response` and are
//! not re-wrapped.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::endpoint::Endpoint;
use crate::error::OperationError;
use crate::json;
use crate::transport::Transport;
use crate::types::to_payload;

/// One logical API call with its own endpoint, request and response shape.
pub trait Operation: Sized + 'static {
    /// Lower-case name used in error messages, e.g. `"text generation"`.
    const DESCRIPTION: &'static str;
    /// Capitalized name used for rejected requests, e.g. `"Generation"`.
    const LABEL: &'static str;
    const ENDPOINT: Endpoint;

    type Request: Serialize;
    type Response;

    /// Validate the decoded payload and build the typed response.
    fn build_response(data: Map<String, Value>) -> Result<Self::Response, OperationError<Self>>;
}

/// Run one `O` round trip over `transport`.
pub fn execute<O, T>(transport: &T, request: &O::Request) -> Result<O::Response, OperationError<O>>
where
    O: Operation,
    T: Transport + ?Sized,
{
    let result = round_trip::<O, T>(transport, request);
    match &result {
        Ok(_) => tracing::debug!(operation = O::DESCRIPTION, "operation succeeded"),
        Err(err) => tracing::warn!(
            operation = O::DESCRIPTION,
            code = err.code(),
            status = err.status(),
            error = %err,
            "operation failed"
        ),
    }
    result
}

fn round_trip<O, T>(transport: &T, request: &O::Request) -> Result<O::Response, OperationError<O>>
where
    O: Operation,
    T: Transport + ?Sized,
{
    let payload = to_payload(request).map_err(OperationError::unexpected)?;

    let response = transport
        .post(O::ENDPOINT.path(), &payload)
        .map_err(OperationError::transport)?;

    if !response.is_successful() {
        return Err(OperationError::rejected(&response));
    }

    let data = json::decode(&response).map_err(|e| OperationError::unexpected(e.into()))?;
    O::build_response(data)
}

/// Mandatory field, with `null` treated as absent.
pub(crate) fn required<'a, O>(data: &'a Map<String, Value>, field: &str) -> Result<&'a Value, OperationError<O>> {
    match data.get(field) {
        None | Some(Value::Null) => Err(OperationError::new(format!(
            "API response is missing required \"{field}\" field"
        ))),
        Some(value) => Ok(value),
    }
}

// Optional metadata: a field that is absent, null or of an unusable type
// stays `None`.

pub(crate) fn optional_string(data: &Map<String, Value>, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::String(s) => Some(s.clone()),
        other => ignored(field, other),
    }
}

pub(crate) fn optional_bool(data: &Map<String, Value>, field: &str) -> Option<bool> {
    match data.get(field)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        other => ignored(field, other),
    }
}

/// Whole number; fractional values are truncated, negatives are ignored.
pub(crate) fn optional_u64(data: &Map<String, Value>, field: &str) -> Option<u64> {
    let value = data.get(field)?;
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        other => ignored(field, other),
    }
}

pub(crate) fn optional_int_list(data: &Map<String, Value>, field: &str) -> Option<Vec<i64>> {
    match data.get(field)? {
        Value::Array(items) => items.iter().map(Value::as_i64).collect(),
        other => ignored(field, other),
    }
}

fn ignored<T>(field: &str, value: &Value) -> Option<T> {
    if !value.is_null() {
        tracing::debug!(field, value = %value, "ignoring response field of unexpected type");
    }
    None
}
