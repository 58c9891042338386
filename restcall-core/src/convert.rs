use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConvertError;

/// A body produced by a converter: raw bytes plus the mime type they carry.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBody {
    pub content_type: String,
    pub data: Bytes,
}

impl EncodedBody {
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        EncodedBody {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Converts between wire bytes and dynamic values.
///
/// The engine pivots through `serde_json::Value` so the trait stays
/// object-safe; typed decoding happens in [`decode_as`]. Implementations must
/// report malformed input through [`ConvertError`], never panic.
pub trait Converter: Send + Sync {
    /// Parse raw response bytes into a dynamic value.
    fn decode(&self, bytes: &[u8]) -> Result<Value, ConvertError>;

    /// Serialize a dynamic value into body bytes plus their mime type.
    fn encode(&self, value: &Value) -> Result<EncodedBody, ConvertError>;
}

/// Decode `bytes` into a concrete `T` through `converter`.
pub fn decode_as<T: DeserializeOwned>(
    converter: &dyn Converter,
    bytes: &[u8],
) -> Result<T, ConvertError> {
    let value = converter.decode(bytes)?;
    serde_json::from_value(value).map_err(|e| ConvertError::Malformed(e.to_string()))
}

/// JSON converter backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl JsonConverter {
    pub const CONTENT_TYPE: &'static str = "application/json; charset=utf-8";

    pub fn new() -> Self {
        JsonConverter
    }
}

impl Converter for JsonConverter {
    fn decode(&self, bytes: &[u8]) -> Result<Value, ConvertError> {
        serde_json::from_slice(bytes).map_err(|e| ConvertError::Malformed(e.to_string()))
    }

    fn encode(&self, value: &Value) -> Result<EncodedBody, ConvertError> {
        let data = serde_json::to_vec(value).map_err(|e| ConvertError::Encode(e.to_string()))?;
        Ok(EncodedBody::new(Self::CONTENT_TYPE, data))
    }
}
