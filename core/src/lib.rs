//! Synchronous client core for an Ollama-compatible model server.
//!
//! # Overview
//! Turns typed generation and embedding requests into HTTP calls, runs them
//! under separate connect and total time budgets, and maps the raw response
//! back to a typed result or a single per-operation error.
//!
//! # Design
//! - `HttpTransport` builds each call as a plain `HttpRequest`, then executes
//!   it on a fresh connection. A non-2xx status is still a successful
//!   exchange; only network and protocol failures are `TransportError`s.
//! - `GenerationClient` and `EmbeddingClient` are generic over `Transport`
//!   and share one round-trip implementation (`operation::execute`).
//! - Callers see exactly one error type per operation (`GenerationError`,
//!   `EmbeddingError`), with the lower-level failure kept as its source.
//! - No retries, no pooling, no streaming.

pub mod config;
pub mod embedding;
pub mod endpoint;
pub mod error;
pub mod generation;
pub mod http;
pub mod json;
pub mod operation;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{ServerConfig, TransportConfig};
pub use embedding::{Embedding, EmbeddingClient, EmbeddingError};
pub use endpoint::Endpoint;
pub use error::{DecodeError, ErrorCause, OperationError, TransportError, TransportErrorKind};
pub use generation::{Generation, GenerationClient, GenerationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{HttpTransport, QueryParams, QueryValue, Transport};
pub use types::{
    EmbeddingInput, EmbeddingRequest, EmbeddingResponse, GenerationOptions, GenerationRequest,
    GenerationResponse, KeepAlive,
};
