use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Shortest HMAC key used as-is; shorter secrets are stretched with SHA-256
pub const MIN_SECRET_BYTES: usize = 32;

/// Token verification failures, grouped by what the client is told
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or invalid Authorization header")]
    MissingHeader,

    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("unsupported token")]
    Unsupported,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("invalid token: {0}")]
    Other(String),
}

impl AuthError {
    /// Client-facing message for the 401 body
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "Missing or invalid Authorization header",
            AuthError::Expired => "Token expired",
            AuthError::InvalidSignature => "Invalid token signature",
            AuthError::Malformed => "Malformed token",
            AuthError::Unsupported => "Unsupported token",
            AuthError::IssuerMismatch | AuthError::Other(_) => "Invalid token",
        }
    }

    /// Label used for the `reason` metric attribute
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::Expired => "expired",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Malformed => "malformed",
            AuthError::Unsupported => "unsupported",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::Other(_) => "other",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::Malformed,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm => AuthError::Unsupported,
            ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
            _ => AuthError::Other(e.to_string()),
        }
    }
}

/// Claim layout of tokens issued by the user service
///
/// `roles` is either a comma separated string or a JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Caller identity derived from a verified token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: String,
    /// Distinct roles in claim order
    pub roles: Vec<String>,
}

impl Identity {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            subject: claims.sub.unwrap_or_default(),
            email: claims.email.unwrap_or_default(),
            roles: claims.roles.as_ref().map(normalize_roles).unwrap_or_default(),
        }
    }

    /// Roles joined with `,` for the `X-User-Roles` header
    pub fn roles_header(&self) -> String {
        self.roles.join(",")
    }
}

fn normalize_roles(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::String(csv) => csv.split(',').map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    };

    let mut roles: Vec<String> = Vec::with_capacity(raw.len());
    for role in raw {
        let role = role.trim();
        if !role.is_empty() && !roles.iter().any(|r| r == role) {
            roles.push(role.to_string());
        }
    }
    roles
}

/// HMAC key bytes for `secret`, stretched when too short
pub fn hmac_key(secret: &[u8]) -> Vec<u8> {
    if secret.len() < MIN_SECRET_BYTES {
        warn!(
            len = secret.len(),
            min = MIN_SECRET_BYTES,
            "JWT secret is shorter than recommended, deriving key with SHA-256"
        );
        Sha256::digest(secret).to_vec()
    } else {
        secret.to_vec()
    }
}

/// Verifies HS256/HS384/HS512 bearer tokens
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], issuer: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(&hmac_key(secret)),
            validation,
            issuer: issuer.filter(|i| !i.is_empty()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        if let Some(expected) = &self.issuer {
            if data.claims.iss.as_deref() != Some(expected.as_str()) {
                return Err(AuthError::IssuerMismatch);
            }
        }
        Ok(Identity::from_claims(data.claims))
    }
}

/// Mints tokens with the same claim layout the verifier expects
pub struct TokenSigner {
    key: EncodingKey,
    algorithm: Algorithm,
    issuer: Option<String>,
    ttl: Duration,
}

impl TokenSigner {
    /// HS512 signer
    pub fn new(secret: &[u8], issuer: Option<String>, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(&hmac_key(secret)),
            algorithm: Algorithm::HS512,
            issuer,
            ttl,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Token for `subject` valid for the configured ttl; roles become a CSV claim
    pub fn sign(&self, subject: &str, email: &str, roles: &[&str]) -> Result<String, AuthError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: Some(subject.to_string()),
            email: Some(email.to_string()),
            roles: Some(Value::String(roles.join(","))),
            iss: self.issuer.clone(),
            iat: Some(now),
            exp: Some(now.saturating_add(self.ttl.as_secs())),
        };
        self.sign_claims(&claims)
    }

    pub fn sign_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.key).map_err(AuthError::from)
    }
}
