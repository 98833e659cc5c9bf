//! Error types for the model-server client.
//!
//! # Design
//! Three layers, matching the three things that can go wrong:
//! - `TransportError`: the server could not be reached or the exchange broke
//!   off (DNS, refused connection, either timeout, read/write failure).
//! - `DecodeError`: the body of a completed exchange is not valid JSON.
//! - `OperationError<O>`: the only error an operation client returns. Every
//!   lower-level failure is folded into it, with the original kept as the
//!   `source()` so the chain stays inspectable.
//!
//! A non-2xx status is never a `TransportError`; it becomes an
//! `OperationError` carrying the HTTP status.

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value};

use crate::http::HttpResponse;
use crate::operation::Operation;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a network or protocol failure.
///
/// `code()` values follow libcurl's `CURLcode` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request URL could not be parsed.
    InvalidUrl,
    /// DNS resolution failed.
    HostNotFound,
    /// The TCP (or TLS) connection could not be established.
    ConnectionFailed,
    /// The connect or total time budget ran out.
    Timeout,
    /// Reading or writing on an open connection failed.
    Io,
    /// The peer spoke something other than valid HTTP/1.1.
    Protocol,
    /// Anything the underlying client does not classify further.
    Other,
}

impl TransportErrorKind {
    pub fn code(self) -> i32 {
        match self {
            TransportErrorKind::InvalidUrl => 3,
            TransportErrorKind::HostNotFound => 6,
            TransportErrorKind::ConnectionFailed => 7,
            TransportErrorKind::Protocol => 8,
            TransportErrorKind::Timeout => 28,
            TransportErrorKind::Io => 56,
            TransportErrorKind::Other => 0,
        }
    }
}

/// Failure to exchange bytes with the server.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    status: Option<u16>,
    response_data: Option<Map<String, Value>>,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            response_data: None,
            source: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_response_data(mut self, data: Map<String, Value>) -> Self {
        self.response_data = Some(data);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn response_data(&self) -> Option<&Map<String, Value>> {
        self.response_data.as_ref()
    }
}

/// The response body is not syntactically valid JSON.
#[derive(Debug, thiserror::Error)]
#[error("Failed to decode JSON response: {source}")]
pub struct DecodeError {
    status: u16,
    #[source]
    source: serde_json::Error,
}

impl DecodeError {
    pub(crate) fn new(status: u16, source: serde_json::Error) -> Self {
        Self { status, source }
    }

    /// HTTP status of the response whose body failed to decode.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Line of the first syntax error, as reported by the parser.
    pub fn line(&self) -> usize {
        self.source.line()
    }

    pub fn column(&self) -> usize {
        self.source.column()
    }
}

/// Lower-level failure wrapped by an `OperationError`.
#[derive(Debug, thiserror::Error)]
pub enum ErrorCause {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The request could not be turned into a JSON object payload.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// The single error type returned by one operation client.
///
/// `O` is a marker for the operation (`Generation`, `Embedding`) so the two
/// clients cannot hand each other's errors around by mistake.
#[derive(thiserror::Error)]
#[error("{message}")]
pub struct OperationError<O> {
    message: String,
    code: i32,
    status: Option<u16>,
    #[source]
    cause: Option<ErrorCause>,
    operation: PhantomData<fn() -> O>,
}

impl<O> OperationError<O> {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
            status: None,
            cause: None,
            operation: PhantomData,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Numeric code: the transport code for transport failures, the HTTP
    /// status for rejected requests, 0 otherwise.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// HTTP status, set only when the server answered with a non-2xx code.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.cause, Some(ErrorCause::Transport(_)))
    }
}

impl<O: Operation> OperationError<O> {
    pub(crate) fn transport(err: TransportError) -> Self {
        Self {
            message: format!("Transport error during {}: {}", O::DESCRIPTION, err.message()),
            code: err.code(),
            status: None,
            cause: Some(ErrorCause::Transport(err)),
            operation: PhantomData,
        }
    }

    pub(crate) fn rejected(response: &HttpResponse) -> Self {
        let status = response.status();
        Self {
            message: format!(
                "{} failed with status code {}: {}",
                O::LABEL,
                status,
                response.body_text()
            ),
            code: i32::from(status),
            status: Some(status),
            cause: None,
            operation: PhantomData,
        }
    }

    pub(crate) fn unexpected(cause: ErrorCause) -> Self {
        Self {
            message: format!("Unexpected error during {}: {}", O::DESCRIPTION, cause),
            code: 0,
            status: None,
            cause: Some(cause),
            operation: PhantomData,
        }
    }
}

impl<O> fmt::Debug for OperationError<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationError")
            .field("message", &self.message)
            .field("code", &self.code)
            .field("status", &self.status)
            .field("cause", &self.cause)
            .finish()
    }
}
