//! Scripted `Transport` for operation-client tests.

use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::transport::{QueryParams, Transport};

/// Returns one scripted result and records every `post`.
pub(crate) struct ScriptedTransport {
    reply: Mutex<Option<Result<HttpResponse, TransportError>>>,
    pub(crate) posts: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl ScriptedTransport {
    pub(crate) fn replying(reply: Result<HttpResponse, TransportError>) -> Self {
        Self {
            reply: Mutex::new(Some(reply)),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::replying(Ok(HttpResponse::new(status, Default::default(), body.as_bytes().to_vec())))
    }

    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    fn take(&self) -> Result<HttpResponse, TransportError> {
        self.reply
            .lock()
            .unwrap()
            .take()
            .expect("scripted transport called more than once")
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, _endpoint: &str, _params: &QueryParams) -> Result<HttpResponse, TransportError> {
        self.take()
    }

    fn post(&self, endpoint: &str, payload: &Map<String, Value>) -> Result<HttpResponse, TransportError> {
        self.posts.lock().unwrap().push((endpoint.to_string(), payload.clone()));
        self.take()
    }
}
