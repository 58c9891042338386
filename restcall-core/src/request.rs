// Request builder
// Binds call-time arguments into a concrete Request according to a compiled
// MethodDescriptor. Pure: same descriptor + args always yield the same
// request, and nothing here touches shared mutable state.

use bytes::Bytes;
use http::Method;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use uuid::Uuid;

use crate::convert::{Converter, EncodedBody};
use crate::error::BuildError;
use crate::method::{BodyEncoding, MethodDescriptor, ParameterBinding};

/// Characters escaped inside a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// Characters escaped inside query keys/values and form fields.
const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'%');

/// One call-time argument, matched positionally against the descriptor's
/// bindings. `Absent` is the engine's rendition of null: absent query,
/// header, field, and part arguments are omitted entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Map(IndexMap<String, String>),
    Json(Value),
    Raw { content_type: String, data: Bytes },
    Absent,
}

impl ArgValue {
    pub fn text(value: impl Into<String>) -> Self {
        ArgValue::Text(value.into())
    }

    /// `Some` becomes text, `None` becomes an absent argument.
    pub fn opt_text(value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => ArgValue::Text(v.into()),
            None => ArgValue::Absent,
        }
    }

    pub fn map(entries: IndexMap<String, String>) -> Self {
        ArgValue::Map(entries)
    }

    pub fn json(value: Value) -> Self {
        ArgValue::Json(value)
    }

    pub fn raw(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        ArgValue::Raw {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Header multimap. Insertion order is preserved and duplicate names are
/// retained, never overwritten; wire-level precedence between duplicates is
/// the transport's business.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers {
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Every value recorded for `name`, in insertion order (ASCII
    /// case-insensitive, as header names are on the wire).
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A concrete request for one invocation.
///
/// The body's content type travels on the body itself; a user-bound
/// `Content-Type` header stays in the multimap alongside it rather than
/// being overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<EncodedBody>,
}

impl Request {
    /// Append a header; used by interceptors layered over the builder.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Append a percent-encoded query pair to the URL.
    pub fn append_query(&mut self, key: &str, value: &str) {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        self.url.push(separator);
        self.url
            .push_str(&utf8_percent_encode(key, QUERY).to_string());
        self.url.push('=');
        self.url
            .push_str(&utf8_percent_encode(value, QUERY).to_string());
    }
}

fn encode_path(value: &str, already_encoded: bool) -> String {
    if already_encoded {
        value.to_string()
    } else {
        utf8_percent_encode(value, PATH_SEGMENT).to_string()
    }
}

fn encode_query(value: &str, already_encoded: bool) -> String {
    if already_encoded {
        value.to_string()
    } else {
        utf8_percent_encode(value, QUERY).to_string()
    }
}

enum QueryPair {
    KeyValue(String, String),
    Bare(String),
}

/// Bind `args` into a concrete request for `descriptor`.
pub fn build_request(
    descriptor: &MethodDescriptor,
    base_url: &str,
    args: &[ArgValue],
    converter: &dyn Converter,
) -> Result<Request, BuildError> {
    let method = descriptor.name();
    let bindings = descriptor.bindings();
    let template = descriptor.template();

    if bindings.len() != args.len() {
        return Err(BuildError::ArityMismatch {
            method: method.to_string(),
            expected: bindings.len(),
            actual: args.len(),
        });
    }

    let mismatch = |index: usize, expected: &'static str| BuildError::ArgumentMismatch {
        method: method.to_string(),
        index,
        expected,
    };

    let mut path = template.path().to_string();
    let mut query: Vec<QueryPair> = Vec::new();
    let mut headers = Headers::new();
    for (name, value) in template.static_headers() {
        headers.append(name.clone(), value.clone());
    }
    let mut form_fields: Vec<(String, String)> = Vec::new();
    let mut parts: Vec<(String, EncodedBody)> = Vec::new();
    let mut body: Option<EncodedBody> = None;

    for (index, binding) in bindings.iter().enumerate() {
        let arg = &args[index];
        match binding {
            ParameterBinding::Path { name, encoded } => match arg {
                ArgValue::Text(value) => {
                    let replaced = encode_path(value, *encoded);
                    path = path.replace(&format!("{{{name}}}"), &replaced);
                }
                ArgValue::Absent => {
                    return Err(BuildError::MissingPathArgument {
                        method: method.to_string(),
                        index,
                        name: name.clone(),
                    });
                }
                _ => return Err(mismatch(index, "text")),
            },
            ParameterBinding::Query { key, encoded } => match arg {
                ArgValue::Text(value) => query.push(QueryPair::KeyValue(
                    encode_query(key, *encoded),
                    encode_query(value, *encoded),
                )),
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "text")),
            },
            ParameterBinding::QueryName { encoded } => match arg {
                ArgValue::Text(name) => query.push(QueryPair::Bare(encode_query(name, *encoded))),
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "text")),
            },
            ParameterBinding::QueryMap { encoded } => match arg {
                ArgValue::Map(entries) => {
                    for (key, value) in entries {
                        query.push(QueryPair::KeyValue(
                            encode_query(key, *encoded),
                            encode_query(value, *encoded),
                        ));
                    }
                }
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "map")),
            },
            ParameterBinding::Header { name } => match arg {
                ArgValue::Text(value) => headers.append(name.clone(), value.clone()),
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "text")),
            },
            ParameterBinding::HeaderMap => match arg {
                ArgValue::Map(entries) => {
                    for (name, value) in entries {
                        headers.append(name.clone(), value.clone());
                    }
                }
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "map")),
            },
            ParameterBinding::Field { name, encoded } => match arg {
                ArgValue::Text(value) => form_fields.push((
                    encode_query(name, *encoded),
                    encode_query(value, *encoded),
                )),
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "text")),
            },
            ParameterBinding::FieldMap { encoded } => match arg {
                ArgValue::Map(entries) => {
                    for (name, value) in entries {
                        form_fields.push((
                            encode_query(name, *encoded),
                            encode_query(value, *encoded),
                        ));
                    }
                }
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "map")),
            },
            ParameterBinding::Part { name } => match arg {
                ArgValue::Text(value) => parts.push((
                    name.clone(),
                    EncodedBody::new("text/plain; charset=utf-8", value.clone().into_bytes()),
                )),
                ArgValue::Raw { content_type, data } => parts.push((
                    name.clone(),
                    EncodedBody::new(content_type.clone(), data.clone()),
                )),
                ArgValue::Json(value) => {
                    let encoded =
                        converter
                            .encode(value)
                            .map_err(|source| BuildError::BodyEncode {
                                method: method.to_string(),
                                source,
                            })?;
                    parts.push((name.clone(), encoded));
                }
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "text, raw, or json")),
            },
            ParameterBinding::PartMap => match arg {
                ArgValue::Map(entries) => {
                    for (name, value) in entries {
                        parts.push((
                            name.clone(),
                            EncodedBody::new(
                                "text/plain; charset=utf-8",
                                value.clone().into_bytes(),
                            ),
                        ));
                    }
                }
                ArgValue::Absent => {}
                _ => return Err(mismatch(index, "map")),
            },
            ParameterBinding::Body => match arg {
                ArgValue::Json(value) => {
                    let encoded =
                        converter
                            .encode(value)
                            .map_err(|source| BuildError::BodyEncode {
                                method: method.to_string(),
                                source,
                            })?;
                    body = Some(encoded);
                }
                // Already carries a byte/mime representation: pass through
                // verbatim without consulting the converter.
                ArgValue::Raw { content_type, data } => {
                    body = Some(EncodedBody::new(content_type.clone(), data.clone()));
                }
                ArgValue::Absent => {
                    return Err(BuildError::MissingBodyArgument {
                        method: method.to_string(),
                        index,
                    });
                }
                _ => return Err(mismatch(index, "json or raw")),
            },
            ParameterBinding::RawBody => match arg {
                ArgValue::Raw { content_type, data } => {
                    body = Some(EncodedBody::new(content_type.clone(), data.clone()));
                }
                ArgValue::Absent => {
                    return Err(BuildError::MissingBodyArgument {
                        method: method.to_string(),
                        index,
                    });
                }
                _ => return Err(mismatch(index, "raw bytes")),
            },
            // Rejected at compile time.
            ParameterBinding::Unbound => return Err(mismatch(index, "a binding")),
        }
    }

    let body = match template.encoding() {
        BodyEncoding::None => None,
        BodyEncoding::SingleEntity => body,
        BodyEncoding::Form => Some(encode_form(&form_fields)),
        BodyEncoding::Multipart => {
            if parts.is_empty() {
                return Err(BuildError::EmptyMultipartBody {
                    method: method.to_string(),
                });
            }
            Some(encode_multipart(&parts))
        }
    };

    let mut url = String::new();
    url.push_str(base_url.trim_end_matches('/'));
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(&path);
    for (i, pair) in query.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        match pair {
            QueryPair::KeyValue(key, value) => {
                url.push_str(key);
                url.push('=');
                url.push_str(value);
            }
            QueryPair::Bare(key) => url.push_str(key),
        }
    }

    Ok(Request {
        method: template.verb().clone(),
        url,
        headers,
        body,
    })
}

fn encode_form(fields: &[(String, String)]) -> EncodedBody {
    let mut out = String::new();
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(name);
        out.push('=');
        out.push_str(value);
    }
    EncodedBody::new("application/x-www-form-urlencoded", out.into_bytes())
}

fn encode_multipart(parts: &[(String, EncodedBody)]) -> EncodedBody {
    let boundary = format!("----restcall-{}", Uuid::new_v4());
    let mut out: Vec<u8> = Vec::new();
    for (name, part) in parts {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
        );
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        out.extend_from_slice(&part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    EncodedBody::new(
        format!("multipart/form-data; boundary={boundary}"),
        out,
    )
}
