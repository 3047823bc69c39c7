use std::sync::Arc;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{Method, StatusCode};
use tracing::warn;

use crate::gateway::filter::{FilterContext, FilterOutcome, GatewayFilter};
use crate::response::error_response;
use crate::telemetry::Metrics;

/// Rejects write requests that do not declare a JSON body
///
/// Content-Length is not required so chunked uploads pass.
#[derive(Default)]
pub struct ValidationFilter {
    metrics: Option<Arc<Metrics>>,
}

impl ValidationFilter {
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self { metrics }
    }

    pub fn check(parts: &Parts) -> bool {
        if !matches!(parts.method, Method::POST | Method::PUT | Method::PATCH) {
            return true;
        }
        parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_json_media_type)
    }
}

/// `application/json` or any `application/*+json`, parameters ignored
fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.strip_prefix("application/") {
        Some("json") => true,
        Some(subtype) => subtype.len() > "+json".len() && subtype.ends_with("+json"),
        None => false,
    }
}

#[async_trait]
impl GatewayFilter for ValidationFilter {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn apply(&self, parts: &mut Parts, _ctx: &mut FilterContext) -> FilterOutcome {
        if Self::check(parts) {
            return FilterOutcome::Continue;
        }
        let path = parts.uri.path();
        warn!(
            path = %path,
            content_type = ?parts.headers.get(CONTENT_TYPE),
            "rejecting request with missing or non-JSON Content-Type"
        );
        if let Some(ref m) = self.metrics {
            m.record_validation_rejection(path);
        }
        FilterOutcome::Respond(error_response(
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/json",
        ))
    }
}
