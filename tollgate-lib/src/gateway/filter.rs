use std::net::SocketAddr;

use async_trait::async_trait;
use http::request::Parts;
use http::HeaderMap;
use hyper::Response;

use crate::response::RespBody;

/// Result of running one filter over a request
pub enum FilterOutcome {
    /// Hand the request to the next filter (or upstream)
    Continue,
    /// Stop the chain and send this response to the client
    Respond(Response<RespBody>),
}

impl std::fmt::Debug for FilterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterOutcome::Continue => f.write_str("Continue"),
            FilterOutcome::Respond(resp) => write!(f, "Respond({})", resp.status()),
        }
    }
}

/// Per-request state shared along the filter chain
#[derive(Debug)]
pub struct FilterContext {
    /// Remote address of the client connection
    pub peer: SocketAddr,
    /// Headers to add to whatever response reaches the client
    pub response_headers: HeaderMap,
}

impl FilterContext {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer, response_headers: HeaderMap::new() }
    }
}

/// One stage of a route's filter chain
///
/// Filters may rewrite request headers in place. Returning
/// [`FilterOutcome::Respond`] short-circuits the remaining filters.
#[async_trait]
pub trait GatewayFilter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, parts: &mut Parts, ctx: &mut FilterContext) -> FilterOutcome;
}
