use http::Method;

use crate::error::MethodError;
use crate::method::BodyEncoding;

/// The static skeleton of a request: everything knowable before arguments
/// arrive. Derived once per method and shared for the client's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    verb: Method,
    path: String,
    placeholders: Vec<String>,
    encoding: BodyEncoding,
    static_headers: Vec<(String, String)>,
}

impl RequestTemplate {
    pub(crate) fn new(
        verb: Method,
        path: String,
        placeholders: Vec<String>,
        encoding: BodyEncoding,
        static_headers: Vec<(String, String)>,
    ) -> Self {
        RequestTemplate {
            verb,
            path,
            placeholders,
            encoding,
            static_headers,
        }
    }

    pub fn verb(&self) -> &Method {
        &self.verb
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Placeholder names in the order they appear in the path pattern.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn encoding(&self) -> BodyEncoding {
        self.encoding
    }

    pub fn static_headers(&self) -> &[(String, String)] {
        &self.static_headers
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }
}

/// Extract `{name}` placeholders from a path pattern, validating syntax.
pub(crate) fn parse_placeholders(method: &str, path: &str) -> Result<Vec<String>, MethodError> {
    let malformed = |detail: &str| MethodError::InvalidPathPattern {
        method: method.to_string(),
        path: path.to_string(),
        detail: detail.to_string(),
    };

    let mut placeholders = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let tail = &rest[open + 1..];
        let close = tail.find('}').ok_or_else(|| malformed("unclosed '{'"))?;
        let name = &tail[..close];
        if name.is_empty() {
            return Err(malformed("empty placeholder name"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(malformed("placeholder names may only contain [A-Za-z0-9_-]"));
        }
        if !placeholders.iter().any(|p| p == name) {
            placeholders.push(name.to_string());
        }
        rest = &tail[close + 1..];
    }
    if rest.contains('}') {
        return Err(malformed("'}' without matching '{'"));
    }
    Ok(placeholders)
}
