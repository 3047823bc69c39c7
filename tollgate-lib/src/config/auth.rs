use serde::Deserialize;

/// Token validation and route classification settings
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Symmetric signing secret shared with the token issuer
    /// Falls back to the `TOLLGATE_JWT_SECRET` environment variable when absent
    #[serde(default)]
    pub secret: Option<String>,
    /// Expected `iss` claim (optional)
    /// When set, tokens with a different or missing issuer are rejected
    #[serde(default)]
    pub issuer: Option<String>,
    /// Paths that never require a token
    /// Entries ending with "/" match as prefixes, other entries match exactly
    #[serde(default = "default_open_endpoints")]
    pub open_endpoints: Vec<String>,
    /// Path prefixes that are public for GET requests
    #[serde(default = "default_public_read_prefixes")]
    pub public_read_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: None,
            open_endpoints: default_open_endpoints(),
            public_read_prefixes: default_public_read_prefixes(),
        }
    }
}

fn default_open_endpoints() -> Vec<String> {
    vec![
        "/auth/sign-in".to_string(),
        "/auth/sign-up".to_string(),
        "/actuator".to_string(),
        "/actuator/".to_string(),
    ]
}

fn default_public_read_prefixes() -> Vec<String> {
    vec!["/api/polls".to_string()]
}
