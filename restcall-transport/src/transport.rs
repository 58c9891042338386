use async_trait::async_trait;
use restcall_core::{NetworkFailure, Request, Response};
use thiserror::Error;

/// Transport-level failure.
///
/// Connectivity-class variants translate into `Outcome::NetworkError`;
/// `InvalidRequest` means the request itself could not be put on the wire
/// and surfaces as an unexpected failure instead.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("canceled: {0}")]
    Canceled(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether this failure happened reaching the server, as opposed to a
    /// malformed request that never left the client.
    pub fn is_connectivity(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }

    pub fn into_failure(self) -> NetworkFailure {
        match self {
            TransportError::Connect(m) => NetworkFailure::connect(m),
            TransportError::Io(m) => NetworkFailure::io(m),
            TransportError::Timeout(m) => NetworkFailure::timeout(m),
            TransportError::Canceled(m) => NetworkFailure::canceled(m),
            TransportError::InvalidRequest(m) => NetworkFailure::io(m),
        }
    }
}

/// Executes one request and returns the raw response.
///
/// Implementations own timeouts and redirects; they raise a
/// connectivity-class [`TransportError`] for unreachable or interrupted
/// network conditions and never classify outcomes themselves.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}
