use thiserror::Error;

/// Construction-time failure for a method descriptor.
///
/// Every variant names the offending method (and parameter index where one
/// exists) so the diagnostic can be read without a debugger. These errors are
/// unconditionally fatal: they surface on every attempt to resolve the
/// malformed method and are never silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    #[error("{method}: parameter #{index} has no binding")]
    UnboundParameter { method: String, index: usize },

    #[error("{method}: parameter #{index} declares a second body; parameter #{first} already carries it")]
    MultipleBodies {
        method: String,
        first: usize,
        index: usize,
    },

    #[error("{method}: parameter #{index} is a body binding but the method is {encoding}-encoded")]
    BodyWithEncodedMethod {
        method: String,
        index: usize,
        encoding: &'static str,
    },

    #[error("{method}: {verb} requests cannot carry a body (parameter #{index})")]
    BodyNotAllowed {
        method: String,
        verb: String,
        index: usize,
    },

    #[error("{method}: parameter #{index} is a form field but the method is not form-encoded")]
    FieldWithoutFormEncoding { method: String, index: usize },

    #[error("{method}: form-encoded method declares no form fields")]
    FormWithoutFields { method: String },

    #[error("{method}: parameter #{index} is a part but the method is not multipart")]
    PartWithoutMultipart { method: String, index: usize },

    #[error("{method}: multipart method declares no parts")]
    MultipartWithoutParts { method: String },

    #[error("{method}: parameter #{index} is a {binding} binding, which cannot accompany a single-entity body")]
    EntityWithNamedBindings {
        method: String,
        index: usize,
        binding: &'static str,
    },

    #[error("{method}: path placeholder {{{placeholder}}} has no bound parameter")]
    MissingPathParameter { method: String, placeholder: String },

    #[error("{method}: parameter #{index} binds path placeholder {{{name}}} which does not appear in \"{path}\"")]
    UnknownPathParameter {
        method: String,
        index: usize,
        name: String,
        path: String,
    },

    #[error("{method}: parameter #{index} binds query key \"{key}\" which collides with a path placeholder")]
    QueryKeyCollidesWithPath {
        method: String,
        index: usize,
        key: String,
    },

    #[error("{method}: malformed path pattern \"{path}\": {detail}")]
    InvalidPathPattern {
        method: String,
        path: String,
        detail: String,
    },

    #[error("{method}: invocation mode never declared; mark the method blocking or dispatched")]
    ModeUnset { method: String },

    #[error("{method}: invocation mode declared twice; a method is blocking or dispatched, never both")]
    ModeConflict { method: String },
}

/// Per-call failure while binding arguments into a concrete request.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{method}: expected {expected} arguments, got {actual}")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("{method}: argument #{index} does not fit its binding (expected {expected})")]
    ArgumentMismatch {
        method: String,
        index: usize,
        expected: &'static str,
    },

    #[error("{method}: argument #{index} for path placeholder {{{name}}} is absent; path parameters are mandatory")]
    MissingPathArgument {
        method: String,
        index: usize,
        name: String,
    },

    #[error("{method}: body argument #{index} is absent")]
    MissingBodyArgument { method: String, index: usize },

    #[error("{method}: multipart body ended up with no parts")]
    EmptyMultipartBody { method: String },

    #[error("{method}: failed to encode body: {source}")]
    BodyEncode {
        method: String,
        #[source]
        source: ConvertError,
    },
}

/// Failure converting between raw bytes and structured values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("failed to encode value: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Malformed(err.to_string())
    }
}
