use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::KeepAliveConfig;
use crate::error::{Result, TollgateError};
use crate::limiter::{CheckRequest, CheckResponse, CHECK_PATH};

/// Ways a call to the limits service can fail
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    #[error("limits service call timed out")]
    Timeout,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status from limits service: {0}")]
    Status(u16),

    #[error("invalid limits service response: {0}")]
    Decode(String),
}

impl LimiterError {
    /// Label used for the `reason` metric attribute
    pub fn reason(&self) -> &'static str {
        match self {
            LimiterError::Timeout => "timeout",
            LimiterError::CircuitOpen => "circuit_open",
            LimiterError::Transport(_) => "transport",
            LimiterError::Status(_) => "status",
            LimiterError::Decode(_) => "decode",
        }
    }
}

/// Remote decision source for the rate limit guard
#[async_trait]
pub trait LimiterBackend: Send + Sync {
    async fn check(&self, req: &CheckRequest) -> std::result::Result<CheckResponse, LimiterError>;
}

type CheckClient = Client<HttpConnector, Full<Bytes>>;

/// `POST /limits/check` over a pooled hyper client
pub struct HttpLimiterBackend {
    client: CheckClient,
    check_uri: Uri,
}

impl HttpLimiterBackend {
    pub fn new(base_url: &str, keep_alive: &KeepAliveConfig, connect_timeout: Duration) -> Result<Self> {
        let check_uri: Uri = format!("{}{}", base_url.trim_end_matches('/'), CHECK_PATH).parse()?;
        if check_uri.scheme_str() != Some("http") || check_uri.authority().is_none() {
            return Err(TollgateError::Config(format!(
                "rate_limit.backend_url must be an absolute http:// URL: {base_url}"
            )));
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        if keep_alive.enabled {
            connector.set_keepalive(Some(Duration::from_secs(keep_alive.timeout_secs)));
        } else {
            connector.set_keepalive(None);
        }
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { client, check_uri })
    }

    pub fn check_uri(&self) -> &Uri {
        &self.check_uri
    }
}

#[async_trait]
impl LimiterBackend for HttpLimiterBackend {
    async fn check(&self, req: &CheckRequest) -> std::result::Result<CheckResponse, LimiterError> {
        let body = serde_json::to_vec(req).map_err(|e| LimiterError::Decode(e.to_string()))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.check_uri.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| LimiterError::Transport(e.to_string()))?;

        let resp = self
            .client
            .request(request)
            .await
            .map_err(|e| LimiterError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LimiterError::Status(status.as_u16()));
        }

        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| LimiterError::Transport(e.to_string()))?
            .to_bytes();

        serde_json::from_slice(&bytes).map_err(|e| LimiterError::Decode(e.to_string()))
    }
}
