// restcall core engine
// Compiles declarative method descriptors into request templates, binds
// call-time arguments into concrete requests, and classifies responses into
// a single tagged outcome per invocation. Transports, executors, and
// converters are collaborators behind traits; dispatch lives in
// restcall-client.

pub mod classify;
pub mod convert;
pub mod error;
pub mod method;
pub mod outcome;
pub mod registry;
pub mod request;
pub mod response;
pub mod template;

pub use classify::classify;
pub use convert::{decode_as, Converter, EncodedBody, JsonConverter};
pub use error::{BuildError, ConvertError, MethodError};
pub use method::{BodyEncoding, InvocationMode, MethodDescriptor, MethodSpec, ParameterBinding};
pub use outcome::{CallError, FailureKind, NetworkFailure, Outcome};
pub use registry::MethodRegistry;
pub use request::{build_request, ArgValue, Headers, Request};
pub use response::Response;
pub use template::RequestTemplate;
