use http::Method;

use crate::config::AuthConfig;

/// Classifies request paths as open or secured
///
/// An entry in `open_endpoints` ending with `/` matches every path under it;
/// other entries match exactly. `GET` requests under a public-read prefix are
/// open as well.
#[derive(Debug, Clone)]
pub struct RouteValidator {
    open_exact: Vec<String>,
    open_prefixes: Vec<String>,
    public_read_prefixes: Vec<String>,
}

impl RouteValidator {
    pub fn new(open_endpoints: &[String], public_read_prefixes: &[String]) -> Self {
        let (open_prefixes, open_exact): (Vec<String>, Vec<String>) =
            open_endpoints.iter().cloned().partition(|e| e.ends_with('/'));
        Self {
            open_exact,
            open_prefixes,
            public_read_prefixes: public_read_prefixes
                .iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.open_endpoints, &config.public_read_prefixes)
    }

    pub fn is_secured(&self, path: &str, method: &Method) -> bool {
        !self.is_open(path, method)
    }

    pub fn is_open(&self, path: &str, method: &Method) -> bool {
        if self.open_exact.iter().any(|e| e == path) {
            return true;
        }
        if self.open_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        *method == Method::GET
            && self
                .public_read_prefixes
                .iter()
                .any(|p| segment_prefix_match(path, p))
    }
}

impl Default for RouteValidator {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

/// `prefix` matches `path` on a segment boundary
pub(crate) fn segment_prefix_match(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
