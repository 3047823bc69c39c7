use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

const APPLICATION_JSON: &str = "application/json";

pub fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> RespBody {
    full_body(Bytes::new())
}

/// Serialize `value` into a JSON response with the given status
///
/// Falls back to an empty 500 if the value cannot be serialized.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<RespBody> {
    match serde_json::to_vec(value) {
        Ok(bytes) => with_json_body(status, bytes),
        Err(e) => {
            warn!(error = %e, "failed to serialize JSON response");
            let mut resp = Response::new(empty_body());
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}

/// Build the `{"success": false, "message": ...}` error body used for every
/// terminal gateway and limiter response.
///
/// Serialization failures degrade to a hardcoded literal instead of
/// propagating.
pub fn error_response(status: StatusCode, message: &str) -> Response<RespBody> {
    let body = json!({ "success": false, "message": message });
    let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| fallback_error_body(message));
    with_json_body(status, bytes)
}

fn fallback_error_body(message: &str) -> Vec<u8> {
    let escaped: String = message
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' || c == '\\' { '\'' } else { c })
        .collect();
    format!("{{\"success\":false,\"message\":\"{escaped}\"}}").into_bytes()
}

fn with_json_body(status: StatusCode, bytes: Vec<u8>) -> Response<RespBody> {
    let mut resp = Response::new(full_body(bytes));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    resp
}
