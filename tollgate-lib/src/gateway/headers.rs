use http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::gateway::token::Identity;
use crate::limiter::CheckResponse;

pub mod names {
    use http::header::HeaderName;

    pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
    pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
    pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");

    pub const X_RATE_REMAINING: HeaderName = HeaderName::from_static("x-rate-remaining");
    pub const X_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-rate-limit-limit");
    pub const X_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-rate-limit-reset");

    pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
}

/// Headers that only the gateway may set on the way upstream
pub const IDENTITY_HEADERS: [HeaderName; 3] =
    [names::X_USER_ID, names::X_USER_EMAIL, names::X_USER_ROLES];

/// Remove client-supplied identity headers, returning how many were dropped
pub fn strip_identity_headers(headers: &mut HeaderMap) -> usize {
    let mut removed = 0;
    for name in IDENTITY_HEADERS.iter() {
        let count = headers.get_all(name).iter().count();
        if count > 0 {
            headers.remove(name);
            removed += count;
        }
    }
    removed
}

/// Write the identity derived from a verified token
pub fn set_identity_headers(headers: &mut HeaderMap, identity: &Identity) {
    headers.insert(names::X_USER_ID, header_value_or_empty(&identity.subject));
    headers.insert(names::X_USER_EMAIL, header_value_or_empty(&identity.email));
    headers.insert(names::X_USER_ROLES, header_value_or_empty(&identity.roles_header()));
}

fn header_value_or_empty(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| {
        debug!("claim not representable as header value, sending empty");
        HeaderValue::from_static("")
    })
}

/// Client-facing quota headers for a limiter decision
///
/// Fields that are absent or negative are left out.
pub fn quota_headers(decision: &CheckResponse) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let fields = [
        (names::X_RATE_REMAINING, decision.remaining),
        (names::X_RATE_LIMIT_LIMIT, decision.limit),
        (names::X_RATE_LIMIT_RESET, decision.reset_seconds),
    ];
    for (name, value) in fields {
        if let Some(v) = value.filter(|v| *v >= 0) {
            headers.insert(name, HeaderValue::from(v));
        }
    }
    headers
}
