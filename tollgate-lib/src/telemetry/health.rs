use hyper::Response;
use hyper::StatusCode;
use serde_json::json;

use crate::response::{json_response, RespBody};

/// Health check response - always returns 200 if process is running
pub fn health_check_response() -> Response<RespBody> {
    json_response(StatusCode::OK, &json!({"status": "healthy"}))
}

/// Readiness check
/// Returns 200 once the server has bound its listener, 503 before that
pub fn ready_check_response(ready: bool) -> Response<RespBody> {
    if ready {
        json_response(StatusCode::OK, &json!({"status": "ready"}))
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({"status": "not_ready", "reason": "listener_not_bound"}),
        )
    }
}

/// Liveness check - always returns 200 if process is running
pub fn live_check_response() -> Response<RespBody> {
    json_response(StatusCode::OK, &json!({"status": "alive"}))
}
