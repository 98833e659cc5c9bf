//! Blocking HTTP transport for the model server.
//!
//! # Design
//! `Transport` is the seam between the operation clients and the network:
//! `get` and `post` return an `HttpResponse` for any completed exchange,
//! whatever its status, and a `TransportError` only when no exchange
//! happened. Operation clients take any `Transport`, so tests substitute a
//! scripted one.
//!
//! `HttpTransport` splits each call into `build_*` (pure, produces an
//! `HttpRequest`) and `execute` (performs I/O). Every `execute` builds a
//! fresh ureq agent, so no connection outlives the call and nothing is
//! retried.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::config::{ServerConfig, TransportConfig};
use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Largest response body read into memory.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

const JSON: &str = "application/json";

/// Scalar value of a query-string parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Skipped when the query string is built.
    Null,
}

impl QueryValue {
    fn encode(&self) -> Option<String> {
        match self {
            QueryValue::String(s) => Some(s.clone()),
            QueryValue::Int(n) => Some(n.to_string()),
            QueryValue::Float(n) => Some(n.to_string()),
            QueryValue::Bool(true) => Some("1".to_string()),
            QueryValue::Bool(false) => Some("0".to_string()),
            QueryValue::Null => None,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

/// Flat query-string parameters for `get`.
pub type QueryParams = BTreeMap<String, QueryValue>;

/// Performs HTTP exchanges against the configured server.
pub trait Transport {
    /// GET `endpoint` with `params` appended as a query string.
    fn get(&self, endpoint: &str, params: &QueryParams) -> Result<HttpResponse, TransportError>;

    /// POST `payload` as a JSON body to `endpoint`.
    fn post(&self, endpoint: &str, payload: &Map<String, Value>) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, endpoint: &str, params: &QueryParams) -> Result<HttpResponse, TransportError> {
        (**self).get(endpoint, params)
    }

    fn post(&self, endpoint: &str, payload: &Map<String, Value>) -> Result<HttpResponse, TransportError> {
        (**self).post(endpoint, payload)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, endpoint: &str, params: &QueryParams) -> Result<HttpResponse, TransportError> {
        (**self).get(endpoint, params)
    }

    fn post(&self, endpoint: &str, payload: &Map<String, Value>) -> Result<HttpResponse, TransportError> {
        (**self).post(endpoint, payload)
    }
}

/// `Transport` over real HTTP/1.1, backed by ureq.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(base_url, TransportConfig::default())
    }

    pub fn with_config(base_url: &str, config: TransportConfig) -> Self {
        let mut headers = vec![
            ("Content-Type".to_string(), JSON.to_string()),
            ("Accept".to_string(), JSON.to_string()),
        ];
        for (name, value) in config.default_headers {
            match headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
                Some(slot) => slot.1 = value,
                None => headers.push((name, value)),
            }
        }

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
        }
    }

    pub fn for_server(server: &ServerConfig, config: TransportConfig) -> Self {
        Self::with_config(&server.base_url(), config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Join the base URL and `endpoint` with exactly one `/`.
    pub fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub fn build_get(&self, endpoint: &str, params: &QueryParams) -> HttpRequest {
        let mut url = self.build_url(endpoint);

        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for (key, value) in params {
            if let Some(encoded) = value.encode() {
                query.append_pair(key, &encoded);
                any = true;
            }
        }
        if any {
            url.push('?');
            url.push_str(&query.finish());
        }

        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: self.headers.clone(),
            body: None,
        }
    }

    pub fn build_post(&self, endpoint: &str, payload: &Map<String, Value>) -> Result<HttpRequest, TransportError> {
        let body = if payload.is_empty() {
            None
        } else {
            let encoded = serde_json::to_string(payload).map_err(|e| {
                TransportError::new(TransportErrorKind::Other, format!("failed to encode request body: {e}"))
                    .with_source(e)
            })?;
            Some(encoded)
        };

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.build_url(endpoint),
            headers: self.headers.clone(),
            body,
        })
    }

    /// Perform `request` on a fresh connection.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let result = self.send(request);
        if let Err(err) = &result {
            tracing::warn!(code = err.code(), error = %err, "transport failure");
        }
        result
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(self.timeout))
            .timeout_connect(Some(self.connect_timeout))
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build()
            .new_agent();

        let outcome = match request.method {
            HttpMethod::Get => {
                let mut builder = agent.get(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = agent.post(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = outcome?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()?;

        tracing::debug!(status, bytes = body.len(), "received response");
        Ok(HttpResponse::new(status, headers, body))
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: &str, params: &QueryParams) -> Result<HttpResponse, TransportError> {
        self.execute(self.build_get(endpoint, params))
    }

    fn post(&self, endpoint: &str, payload: &Map<String, Value>) -> Result<HttpResponse, TransportError> {
        let request = self.build_post(endpoint, payload)?;
        self.execute(request)
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        let kind = match &err {
            ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
            ureq::Error::HostNotFound => TransportErrorKind::HostNotFound,
            ureq::Error::ConnectionFailed => TransportErrorKind::ConnectionFailed,
            ureq::Error::BadUri(_) | ureq::Error::Http(_) => TransportErrorKind::InvalidUrl,
            ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
                TransportErrorKind::ConnectionFailed
            }
            ureq::Error::Io(_) => TransportErrorKind::Io,
            ureq::Error::Protocol(_) => TransportErrorKind::Protocol,
            ureq::Error::BodyExceedsLimit(_) => TransportErrorKind::Io,
            _ => TransportErrorKind::Other,
        };
        TransportError::new(kind, err.to_string()).with_source(err)
    }
}
