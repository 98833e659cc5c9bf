//! JSON view of a response body.
//!
//! Bodies that parse to something other than an object are wrapped as
//! `{"data": value}` rather than rejected; only syntactically invalid JSON
//! is an error.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::http::HttpResponse;

/// Key under which a non-object top-level value is returned.
pub const DATA_KEY: &str = "data";

/// Parse the body of `response` as a JSON object.
pub fn decode(response: &HttpResponse) -> Result<Map<String, Value>, DecodeError> {
    let value: Value = serde_json::from_slice(response.body())
        .map_err(|e| DecodeError::new(response.status(), e))?;

    Ok(match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::with_capacity(1);
            map.insert(DATA_KEY.to_string(), other);
            map
        }
    })
}

impl HttpResponse {
    /// Shorthand for [`decode`].
    pub fn json(&self) -> Result<Map<String, Value>, DecodeError> {
        decode(self)
    }
}
