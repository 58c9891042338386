use std::fmt;

use thiserror::Error;

use crate::error::ConvertError;

/// Why the network failed before a status line was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connect,
    Io,
    Timeout,
    Canceled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Connect => "connect",
            FailureKind::Io => "io",
            FailureKind::Timeout => "timeout",
            FailureKind::Canceled => "canceled",
        };
        write!(f, "{}", s)
    }
}

/// A connectivity failure. `Canceled` marks caller-initiated cancellation so
/// it stays distinguishable from a genuine I/O failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct NetworkFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl NetworkFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        NetworkFailure {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connect, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Io, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Canceled, message)
    }

    pub fn is_canceled(&self) -> bool {
        self.kind == FailureKind::Canceled
    }
}

/// The tagged result of one invocation. Exactly one case is produced per
/// invocation; no case is skipped or duplicated.
///
/// `ClientError` decodes its payload with the method's *success* type `T`,
/// not the error type — the contract dependents of the original engine rely
/// on. `ServerError` carries the conversion failure as `cause` when a 2xx
/// body failed to decode.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Success(T),
    Unauthorized(Option<E>),
    ClientError { body: Option<T>, status: u16 },
    ServerError {
        error: Option<E>,
        status: u16,
        cause: Option<ConvertError>,
    },
    NetworkError(NetworkFailure),
    UnexpectedError(anyhow::Error),
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Stable name of the case, for logs and assertions.
    pub fn case(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Unauthorized(_) => "unauthorized",
            Outcome::ClientError { .. } => "client_error",
            Outcome::ServerError { .. } => "server_error",
            Outcome::NetworkError(_) => "network_error",
            Outcome::UnexpectedError(_) => "unexpected_error",
        }
    }

    /// Collapse into the blocking-mode result: the success value, or a typed
    /// error still carrying the full outcome payload.
    pub fn into_result(self) -> Result<T, CallError<T, E>> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Unauthorized(error) => Err(CallError::Unauthorized(error)),
            Outcome::ClientError { body, status } => Err(CallError::Client { body, status }),
            Outcome::ServerError {
                error,
                status,
                cause,
            } => Err(CallError::Server {
                error,
                status,
                cause,
            }),
            Outcome::NetworkError(failure) => Err(CallError::Network(failure)),
            Outcome::UnexpectedError(cause) => Err(CallError::Unexpected(cause)),
        }
    }
}

/// Typed error for blocking invocations. Mirrors the non-success outcome
/// cases so callers can recover programmatically.
#[derive(Debug, Error)]
pub enum CallError<T, E> {
    #[error("unauthorized (HTTP 401)")]
    Unauthorized(Option<E>),

    #[error("client error (HTTP {status})")]
    Client { body: Option<T>, status: u16 },

    #[error("server error (HTTP {status})")]
    Server {
        error: Option<E>,
        status: u16,
        cause: Option<ConvertError>,
    },

    #[error("network failure: {0}")]
    Network(NetworkFailure),

    #[error("unexpected failure: {0}")]
    Unexpected(anyhow::Error),
}
