// Method descriptor compiler
// A MethodSpec is the declarative description of one remote method; compiling
// it validates the declaration and produces the immutable MethodDescriptor
// consumed by the request builder and dispatch layer.

use http::Method;

use crate::error::MethodError;
use crate::template::{parse_placeholders, RequestTemplate};

/// Whether a method returns its outcome inline or delivers it to a callback.
///
/// Decided once at construction; a method is never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    Blocking,
    Dispatched,
}

/// How the request body is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    None,
    Form,
    Multipart,
    SingleEntity,
}

impl BodyEncoding {
    fn label(self) -> &'static str {
        match self {
            BodyEncoding::None => "none",
            BodyEncoding::Form => "form",
            BodyEncoding::Multipart => "multipart",
            BodyEncoding::SingleEntity => "single-entity",
        }
    }
}

/// One positional parameter binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterBinding {
    /// Substitutes into a `{name}` path placeholder. Mandatory at call time.
    Path { name: String, encoded: bool },
    /// One `key=value` query pair; absent arguments are omitted entirely.
    Query { key: String, encoded: bool },
    /// A valueless query key, emitted bare.
    QueryName { encoded: bool },
    /// Expands to one pair per map entry, preserving insertion order.
    QueryMap { encoded: bool },
    /// Appends to the header multimap; never replaces.
    Header { name: String },
    /// Expands to one header per map entry.
    HeaderMap,
    /// One form field on a form-encoded method.
    Field { name: String, encoded: bool },
    /// Expands to one form field per map entry.
    FieldMap { encoded: bool },
    /// One part of a multipart method.
    Part { name: String },
    /// Expands to one part per map entry.
    PartMap,
    /// The single entity, serialized through the converter.
    Body,
    /// The single entity, passed through verbatim with its own mime type.
    RawBody,
    /// Declared but never bound. Always a construction-time error; exists so
    /// generated service definitions can surface the mistake with an index.
    Unbound,
}

impl ParameterBinding {
    pub fn path(name: impl Into<String>) -> Self {
        ParameterBinding::Path {
            name: name.into(),
            encoded: false,
        }
    }

    pub fn path_encoded(name: impl Into<String>) -> Self {
        ParameterBinding::Path {
            name: name.into(),
            encoded: true,
        }
    }

    pub fn query(key: impl Into<String>) -> Self {
        ParameterBinding::Query {
            key: key.into(),
            encoded: false,
        }
    }

    pub fn query_encoded(key: impl Into<String>) -> Self {
        ParameterBinding::Query {
            key: key.into(),
            encoded: true,
        }
    }

    pub fn query_name() -> Self {
        ParameterBinding::QueryName { encoded: false }
    }

    pub fn query_map() -> Self {
        ParameterBinding::QueryMap { encoded: false }
    }

    pub fn header(name: impl Into<String>) -> Self {
        ParameterBinding::Header { name: name.into() }
    }

    pub fn header_map() -> Self {
        ParameterBinding::HeaderMap
    }

    pub fn field(name: impl Into<String>) -> Self {
        ParameterBinding::Field {
            name: name.into(),
            encoded: false,
        }
    }

    pub fn field_map() -> Self {
        ParameterBinding::FieldMap { encoded: false }
    }

    pub fn part(name: impl Into<String>) -> Self {
        ParameterBinding::Part { name: name.into() }
    }

    pub fn part_map() -> Self {
        ParameterBinding::PartMap
    }

    pub fn body() -> Self {
        ParameterBinding::Body
    }

    pub fn raw_body() -> Self {
        ParameterBinding::RawBody
    }

    fn label(&self) -> &'static str {
        match self {
            ParameterBinding::Path { .. } => "path",
            ParameterBinding::Query { .. } => "query",
            ParameterBinding::QueryName { .. } => "query-name",
            ParameterBinding::QueryMap { .. } => "query-map",
            ParameterBinding::Header { .. } => "header",
            ParameterBinding::HeaderMap => "header-map",
            ParameterBinding::Field { .. } => "field",
            ParameterBinding::FieldMap { .. } => "field-map",
            ParameterBinding::Part { .. } => "part",
            ParameterBinding::PartMap => "part-map",
            ParameterBinding::Body => "body",
            ParameterBinding::RawBody => "raw-body",
            ParameterBinding::Unbound => "unbound",
        }
    }
}

/// Compiled, immutable metadata for one remote method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    name: String,
    mode: InvocationMode,
    template: RequestTemplate,
    bindings: Vec<ParameterBinding>,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> InvocationMode {
        self.mode
    }

    pub fn template(&self) -> &RequestTemplate {
        &self.template
    }

    pub fn verb(&self) -> &Method {
        self.template.verb()
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }
}

/// Declarative description of a remote method, compiled into a
/// [`MethodDescriptor`] by [`MethodSpec::compile`].
#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    verb: Method,
    path: String,
    mode: Option<InvocationMode>,
    mode_conflict: bool,
    encoding: BodyEncoding,
    bindings: Vec<ParameterBinding>,
    static_headers: Vec<(String, String)>,
}

impl MethodSpec {
    fn new(name: impl Into<String>, verb: Method, path: impl Into<String>) -> Self {
        MethodSpec {
            name: name.into(),
            verb,
            path: path.into(),
            mode: None,
            mode_conflict: false,
            encoding: BodyEncoding::None,
            bindings: Vec::new(),
            static_headers: Vec::new(),
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::POST, path)
    }

    pub fn put(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::PUT, path)
    }

    pub fn patch(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::PATCH, path)
    }

    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::DELETE, path)
    }

    pub fn head(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::HEAD, path)
    }

    /// Outcome is returned inline to the caller.
    pub fn blocking(mut self) -> Self {
        self.set_mode(InvocationMode::Blocking);
        self
    }

    /// Outcome is delivered to a callback on the callback executor.
    pub fn dispatched(mut self) -> Self {
        self.set_mode(InvocationMode::Dispatched);
        self
    }

    fn set_mode(&mut self, mode: InvocationMode) {
        if self.mode.is_some() {
            self.mode_conflict = true;
        }
        self.mode = Some(mode);
    }

    pub fn form_encoded(mut self) -> Self {
        self.encoding = BodyEncoding::Form;
        self
    }

    pub fn multipart(mut self) -> Self {
        self.encoding = BodyEncoding::Multipart;
        self
    }

    /// A header attached to every request of this method.
    pub fn static_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_headers.push((name.into(), value.into()));
        self
    }

    /// Declare the next positional parameter.
    pub fn param(mut self, binding: ParameterBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Validate the declaration and produce the immutable descriptor.
    pub fn compile(self) -> Result<MethodDescriptor, MethodError> {
        let method = self.name.clone();

        if self.mode_conflict {
            return Err(MethodError::ModeConflict { method });
        }
        let mode = self.mode.ok_or(MethodError::ModeUnset {
            method: method.clone(),
        })?;

        let placeholders = parse_placeholders(&method, &self.path)?;

        let verb_allows_body =
            self.verb == Method::POST || self.verb == Method::PUT || self.verb == Method::PATCH;
        let mut encoding = self.encoding;
        let mut body_index: Option<usize> = None;

        for (index, binding) in self.bindings.iter().enumerate() {
            match binding {
                ParameterBinding::Unbound => {
                    return Err(MethodError::UnboundParameter {
                        method: method.clone(),
                        index,
                    });
                }
                ParameterBinding::Path { name, .. } => {
                    if !placeholders.iter().any(|p| p == name) {
                        return Err(MethodError::UnknownPathParameter {
                            method: method.clone(),
                            index,
                            name: name.clone(),
                            path: self.path.clone(),
                        });
                    }
                }
                ParameterBinding::Query { key, .. } => {
                    if placeholders.iter().any(|p| p == key) {
                        return Err(MethodError::QueryKeyCollidesWithPath {
                            method: method.clone(),
                            index,
                            key: key.clone(),
                        });
                    }
                }
                ParameterBinding::Field { .. } | ParameterBinding::FieldMap { .. } => {
                    if self.encoding != BodyEncoding::Form {
                        return Err(MethodError::FieldWithoutFormEncoding {
                            method: method.clone(),
                            index,
                        });
                    }
                }
                ParameterBinding::Part { .. } | ParameterBinding::PartMap => {
                    if self.encoding != BodyEncoding::Multipart {
                        return Err(MethodError::PartWithoutMultipart {
                            method: method.clone(),
                            index,
                        });
                    }
                }
                ParameterBinding::Body | ParameterBinding::RawBody => {
                    if let Some(first) = body_index {
                        return Err(MethodError::MultipleBodies {
                            method: method.clone(),
                            first,
                            index,
                        });
                    }
                    if !verb_allows_body {
                        return Err(MethodError::BodyNotAllowed {
                            method: method.clone(),
                            verb: self.verb.to_string(),
                            index,
                        });
                    }
                    body_index = Some(index);
                }
                ParameterBinding::QueryName { .. }
                | ParameterBinding::QueryMap { .. }
                | ParameterBinding::Header { .. }
                | ParameterBinding::HeaderMap => {}
            }
        }

        if let Some(body) = body_index {
            let named = self.bindings.iter().enumerate().find(|(_, b)| {
                matches!(
                    b,
                    ParameterBinding::Field { .. }
                        | ParameterBinding::FieldMap { .. }
                        | ParameterBinding::Part { .. }
                        | ParameterBinding::PartMap
                )
            });
            if let Some((index, binding)) = named {
                return Err(MethodError::EntityWithNamedBindings {
                    method: method.clone(),
                    index,
                    binding: binding.label(),
                });
            }
            if self.encoding != BodyEncoding::None {
                return Err(MethodError::BodyWithEncodedMethod {
                    method: method.clone(),
                    index: body,
                    encoding: self.encoding.label(),
                });
            }
            encoding = BodyEncoding::SingleEntity;
        }

        match self.encoding {
            BodyEncoding::Form => {
                let has_fields = self.bindings.iter().any(|b| {
                    matches!(
                        b,
                        ParameterBinding::Field { .. } | ParameterBinding::FieldMap { .. }
                    )
                });
                if !has_fields {
                    return Err(MethodError::FormWithoutFields {
                        method: method.clone(),
                    });
                }
                if !verb_allows_body {
                    return Err(MethodError::BodyNotAllowed {
                        method: method.clone(),
                        verb: self.verb.to_string(),
                        index: 0,
                    });
                }
            }
            BodyEncoding::Multipart => {
                let has_parts = self.bindings.iter().any(|b| {
                    matches!(b, ParameterBinding::Part { .. } | ParameterBinding::PartMap)
                });
                if !has_parts {
                    return Err(MethodError::MultipartWithoutParts {
                        method: method.clone(),
                    });
                }
                if !verb_allows_body {
                    return Err(MethodError::BodyNotAllowed {
                        method: method.clone(),
                        verb: self.verb.to_string(),
                        index: 0,
                    });
                }
            }
            BodyEncoding::None | BodyEncoding::SingleEntity => {}
        }

        for placeholder in &placeholders {
            let bound = self.bindings.iter().any(|b| {
                matches!(b, ParameterBinding::Path { name, .. } if name == placeholder)
            });
            if !bound {
                return Err(MethodError::MissingPathParameter {
                    method: method.clone(),
                    placeholder: placeholder.clone(),
                });
            }
        }

        let template = RequestTemplate::new(
            self.verb,
            self.path,
            placeholders,
            encoding,
            self.static_headers,
        );

        Ok(MethodDescriptor {
            name: self.name,
            mode,
            template,
            bindings: self.bindings,
        })
    }
}
