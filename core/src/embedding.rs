//! Embedding generation over `POST /api/embed`.

use serde_json::{Map, Value};

use crate::endpoint::Endpoint;
use crate::error::OperationError;
use crate::operation::{self, optional_string, optional_u64, required, Operation};
use crate::transport::Transport;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Marker for the embedding operation.
#[derive(Debug, Clone, Copy)]
pub struct Embedding;

/// Error returned by [`EmbeddingClient::embed`].
pub type EmbeddingError = OperationError<Embedding>;

impl Operation for Embedding {
    const DESCRIPTION: &'static str = "embedding generation";
    const LABEL: &'static str = "Embedding generation";
    const ENDPOINT: Endpoint = Endpoint::Embed;

    type Request = EmbeddingRequest;
    type Response = EmbeddingResponse;

    fn build_response(data: Map<String, Value>) -> Result<EmbeddingResponse, EmbeddingError> {
        let items = match required::<Self>(&data, "embeddings")? {
            Value::Array(items) => items,
            _ => {
                return Err(OperationError::new(
                    "API response \"embeddings\" field must be an array",
                ))
            }
        };
        let embeddings = items.iter().map(vector).collect::<Option<Vec<_>>>().ok_or_else(|| {
            EmbeddingError::new("API response \"embeddings\" field must be an array of numeric vectors")
        })?;

        let mut response = EmbeddingResponse::new(embeddings);
        response.model = optional_string(&data, "model");
        response.total_duration = optional_u64(&data, "total_duration");
        response.load_duration = optional_u64(&data, "load_duration");
        response.prompt_eval_count = optional_u64(&data, "prompt_eval_count");
        Ok(response)
    }
}

fn vector(item: &Value) -> Option<Vec<f64>> {
    item.as_array()?.iter().map(Value::as_f64).collect()
}

/// Generates embeddings through any [`Transport`].
#[derive(Debug, Clone)]
pub struct EmbeddingClient<T> {
    transport: T,
}

impl<T: Transport> EmbeddingClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, EmbeddingError> {
        operation::execute::<Embedding, T>(&self.transport, request)
    }
}
