use std::sync::Arc;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::request::Parts;
use http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::{Result, TollgateError};
use crate::gateway::filter::{FilterContext, FilterOutcome, GatewayFilter};
use crate::gateway::headers::set_identity_headers;
use crate::gateway::route_validator::RouteValidator;
use crate::gateway::token::{AuthError, Identity, TokenVerifier};
use crate::response::error_response;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

const BEARER_PREFIX: &str = "Bearer ";

/// Bearer-token enforcement for secured routes
///
/// Open routes are passed through; a token presented on an open route is
/// still verified and, when valid, propagated as identity headers.
pub struct AuthEnforcer {
    verifier: TokenVerifier,
    validator: RouteValidator,
    metrics: Option<Arc<Metrics>>,
}

impl AuthEnforcer {
    pub fn new(
        verifier: TokenVerifier,
        validator: RouteValidator,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { verifier, validator, metrics }
    }

    pub fn from_config(config: &AuthConfig, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TollgateError::Config("auth.secret is required".into()))?;
        Ok(Self::new(
            TokenVerifier::new(secret.as_bytes(), config.issuer.clone()),
            RouteValidator::from_config(config),
            metrics,
        ))
    }

    /// Check the request and inject identity headers on success
    ///
    /// Returns the identity when a valid token was presented, `None` for
    /// anonymous access to an open route.
    pub fn enforce(&self, parts: &mut Parts) -> std::result::Result<Option<Identity>, AuthError> {
        let path = parts.uri.path();
        let secured = self.validator.is_secured(path, &parts.method);
        let token = bearer_token(&parts.headers);

        if !secured {
            let Some(token) = token else {
                return Ok(None);
            };
            return match self.verifier.verify(token) {
                Ok(identity) => {
                    set_identity_headers(&mut parts.headers, &identity);
                    Ok(Some(identity))
                }
                Err(e) => {
                    debug!(path = %path, error = %e, "ignoring invalid token on open route");
                    Ok(None)
                }
            };
        }

        let Some(token) = token else {
            return Err(AuthError::MissingHeader);
        };
        let identity = self.verifier.verify(token).inspect_err(|e| match e {
            AuthError::Expired => warn!(path = %path, "rejected expired token"),
            AuthError::InvalidSignature => warn!(path = %path, "rejected token with bad signature"),
            AuthError::Malformed => warn!(path = %path, "rejected malformed token"),
            AuthError::Unsupported => warn!(path = %path, "rejected unsupported token"),
            AuthError::IssuerMismatch => warn!(path = %path, "rejected token from unexpected issuer"),
            other => warn!(path = %path, error = %other, "rejected token"),
        })?;
        set_identity_headers(&mut parts.headers, &identity);
        Ok(Some(identity))
    }

    fn record(&self, outcome: &str, reason: Option<&str>) {
        if let Some(ref m) = self.metrics {
            m.record_auth(outcome, reason);
        }
    }
}

/// Token after `Bearer `, if the Authorization header has that form
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}

#[async_trait]
impl GatewayFilter for AuthEnforcer {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn apply(&self, parts: &mut Parts, _ctx: &mut FilterContext) -> FilterOutcome {
        match self.enforce(parts) {
            Ok(Some(_)) => {
                self.record(values::AUTH_AUTHENTICATED, None);
                FilterOutcome::Continue
            }
            Ok(None) => {
                self.record(values::AUTH_ANONYMOUS, None);
                FilterOutcome::Continue
            }
            Err(e) => {
                self.record(values::AUTH_REJECTED, Some(e.reason()));
                FilterOutcome::Respond(error_response(StatusCode::UNAUTHORIZED, e.message()))
            }
        }
    }
}
