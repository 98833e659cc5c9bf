//! Text generation over `POST /api/generate`.

use serde_json::{Map, Value};

use crate::endpoint::Endpoint;
use crate::error::OperationError;
use crate::operation::{self, optional_bool, optional_int_list, optional_string, optional_u64, required, Operation};
use crate::transport::Transport;
use crate::types::{GenerationRequest, GenerationResponse};

/// Marker for the text generation operation.
#[derive(Debug, Clone, Copy)]
pub struct Generation;

/// Error returned by [`GenerationClient::generate`].
pub type GenerationError = OperationError<Generation>;

impl Operation for Generation {
    const DESCRIPTION: &'static str = "text generation";
    const LABEL: &'static str = "Generation";
    const ENDPOINT: Endpoint = Endpoint::Generate;

    type Request = GenerationRequest;
    type Response = GenerationResponse;

    fn build_response(data: Map<String, Value>) -> Result<GenerationResponse, GenerationError> {
        let text = match required::<Self>(&data, "response")? {
            Value::String(s) => s.clone(),
            _ => {
                return Err(OperationError::new(
                    "API response \"response\" field must be a string",
                ))
            }
        };

        let mut response = GenerationResponse::new(text);
        response.model = optional_string(&data, "model");
        response.created_at = optional_string(&data, "created_at");
        response.done = optional_bool(&data, "done");
        response.context = optional_int_list(&data, "context");
        response.total_duration = optional_u64(&data, "total_duration");
        response.load_duration = optional_u64(&data, "load_duration");
        response.prompt_eval_count = optional_u64(&data, "prompt_eval_count");
        response.prompt_eval_duration = optional_u64(&data, "prompt_eval_duration");
        response.eval_count = optional_u64(&data, "eval_count");
        response.eval_duration = optional_u64(&data, "eval_duration");
        Ok(response)
    }
}

/// Generates text through any [`Transport`].
#[derive(Debug, Clone)]
pub struct GenerationClient<T> {
    transport: T,
}

impl<T: Transport> GenerationClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        operation::execute::<Generation, T>(&self.transport, request)
    }
}
