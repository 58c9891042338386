// Response classifier
// Single decision point per invocation, deterministic on (status, body
// presence). Decode failures on error bodies degrade to a null payload and
// keep the case; a 2xx body that fails to decode escalates to ServerError,
// because a successful status with an unparsable body is a broken contract
// with the server, not a client bug. The same reasoning classifies a 2xx
// response with no body at all as ServerError.

use anyhow::anyhow;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::convert::{decode_as, Converter};
use crate::outcome::Outcome;
use crate::response::Response;

/// Map a response to its outcome case.
pub fn classify<T, E>(response: &Response, converter: &dyn Converter) -> Outcome<T, E>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
{
    let status = response.status.as_u16();

    if (200..300).contains(&status) {
        if !response.has_body() {
            return Outcome::ServerError {
                error: None,
                status,
                cause: None,
            };
        }
        return match decode_as::<T>(converter, &response.body) {
            Ok(value) => Outcome::Success(value),
            Err(cause) => {
                warn!(status, %cause, "response body failed to decode");
                Outcome::ServerError {
                    error: None,
                    status,
                    cause: Some(cause),
                }
            }
        };
    }

    if status == 401 {
        return Outcome::Unauthorized(try_decode::<E>(response, converter));
    }

    if status >= 500 {
        return Outcome::ServerError {
            error: try_decode::<E>(response, converter),
            status,
            cause: None,
        };
    }

    if (400..500).contains(&status) {
        // 4xx payloads decode with the success type; see Outcome docs.
        return Outcome::ClientError {
            body: try_decode::<T>(response, converter),
            status,
        };
    }

    Outcome::UnexpectedError(anyhow!(
        "HTTP {} is outside the response contract",
        status
    ))
}

/// Decode an error/informational body, degrading to `None` on failure.
fn try_decode<P: DeserializeOwned>(response: &Response, converter: &dyn Converter) -> Option<P> {
    if !response.has_body() {
        return None;
    }
    match decode_as::<P>(converter, &response.body) {
        Ok(value) => Some(value),
        Err(cause) => {
            warn!(status = response.status.as_u16(), %cause, "error body failed to decode; dropping payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::JsonConverter;
    use crate::request::Headers;
    use http::StatusCode;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        name: String,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct ApiError {
        reason: String,
    }

    fn response(status: u16, body: &str) -> Response {
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            Headers::new(),
            body.to_string(),
        )
    }

    fn classify_item(status: u16, body: &str) -> Outcome<Item, ApiError> {
        classify(&response(status, body), &JsonConverter::new())
    }

    #[test]
    fn test_success() {
        match classify_item(200, r#"{"name":"a"}"#) {
            Outcome::Success(item) => assert_eq!(item.name, "a"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_success_body_decode_failure_escalates() {
        match classify_item(200, "not json") {
            Outcome::ServerError {
                error: None,
                status: 200,
                cause: Some(_),
            } => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_success_body_is_server_error() {
        match classify_item(204, "") {
            Outcome::ServerError {
                error: None,
                status: 204,
                cause: None,
            } => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_with_payload() {
        match classify_item(401, r#"{"reason":"expired"}"#) {
            Outcome::Unauthorized(Some(e)) => assert_eq!(e.reason, "expired"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_malformed_payload_degrades_to_none() {
        match classify_item(401, "oops") {
            Outcome::Unauthorized(None) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_client_error_uses_success_type() {
        match classify_item(404, r#"{"name":"missing"}"#) {
            Outcome::ClientError {
                body: Some(item),
                status: 404,
            } => assert_eq!(item.name, "missing"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_server_error_with_error_payload() {
        match classify_item(503, r#"{"reason":"overloaded"}"#) {
            Outcome::ServerError {
                error: Some(e),
                status: 503,
                cause: None,
            } => assert_eq!(e.reason, "overloaded"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_informational_status_is_unexpected() {
        match classify_item(301, "") {
            Outcome::UnexpectedError(_) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
