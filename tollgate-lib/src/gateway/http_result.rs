use http::StatusCode;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is turned into a terminal JSON error response
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong between route selection and the
/// upstream response
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("No route for path")]
    NoMatchingRoute,

    #[error("Failed to generate upstream request: {0}")]
    FailedToGenerateUpstreamRequest(String),

    #[error("Failed to get response from upstream: {0}")]
    FailedToGetResponseFromUpstream(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),
}

impl HttpError {
    /// Label used for the `error_type` metric attribute
    pub fn error_type(&self) -> &'static str {
        match self {
            HttpError::NoMatchingRoute => "no_route",
            HttpError::FailedToGenerateUpstreamRequest(_) => "upstream_request",
            HttpError::FailedToGetResponseFromUpstream(_) => "upstream_unavailable",
            HttpError::InvalidUri(_) => "invalid_uri",
        }
    }

    /// Message placed in the client-facing error body
    pub fn message(&self) -> &'static str {
        match self {
            HttpError::NoMatchingRoute => "No route for path",
            HttpError::FailedToGenerateUpstreamRequest(_) => "Internal server error",
            HttpError::FailedToGetResponseFromUpstream(_) => "Upstream unavailable",
            HttpError::InvalidUri(_) => "Invalid request path",
        }
    }
}

impl From<HttpError> for StatusCode {
    fn from(e: HttpError) -> StatusCode {
        match e {
            HttpError::NoMatchingRoute => StatusCode::NOT_FOUND,
            HttpError::FailedToGenerateUpstreamRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::FailedToGetResponseFromUpstream(_) => StatusCode::BAD_GATEWAY,
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
        }
    }
}
