use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;

use crate::request::Headers;

/// One HTTP response as seen by the classifier.
///
/// An empty body counts as absent; `elapsed` is stamped by the invocation
/// layer around the transport call, not by the transport itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: Bytes,
    pub elapsed: Duration,
}

impl Response {
    pub fn new(status: StatusCode, headers: Headers, body: impl Into<Bytes>) -> Self {
        Response {
            status,
            reason: status.canonical_reason().map(str::to_string),
            headers,
            body: body.into(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}
