use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::request::Parts;
use http::{Request, Response, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;
use tracing::warn;

use crate::config::KeepAliveConfig;
use crate::gateway::http_result::{HttpError, HttpResult};
use crate::response::RespBody;
use crate::telemetry::Metrics;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type UpstreamBody = UnsyncBoxBody<Bytes, BoxError>;
pub type HttpClient = Client<HttpConnector, UpstreamBody>;

/// Shared HTTP client for upstream connections
///
/// One pooled HTTP/1.1 client reused across routes so connections to the
/// same upstream are kept alive between requests.
#[derive(Clone)]
pub struct ClientPool {
    client: HttpClient,
}

impl ClientPool {
    pub fn new(keep_alive: &KeepAliveConfig, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        // TCP keep-alive: sends periodic packets to keep TCP connection alive
        if keep_alive.enabled {
            connector.set_keepalive(Some(Duration::from_secs(keep_alive.timeout_secs)));
        } else {
            connector.set_keepalive(None);
        }

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(Duration::from_secs(keep_alive.timeout_secs));

        Self { client: builder.build(connector) }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

/// Upstream target of a route: scheme and authority, no path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    base: String,
}

impl Upstream {
    pub fn parse(raw: &str) -> HttpResult<Self> {
        let uri: Uri = raw.parse().map_err(|e: http::uri::InvalidUri| {
            HttpError::InvalidUri(format!("{raw}: {e}"))
        })?;
        let scheme = uri.scheme_str().unwrap_or("http");
        if scheme != "http" {
            return Err(HttpError::InvalidUri(format!("{raw}: only http upstreams are supported")));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| HttpError::InvalidUri(format!("{raw}: missing host")))?;
        Ok(Self { base: format!("http://{authority}") })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

/// Swap `matched_prefix` for `replace_path` at the start of the path
///
/// The query string, if any, is kept untouched.
pub fn rewrite_path(
    path_and_query: &str,
    matched_prefix: &str,
    replace_path: Option<&str>,
) -> HttpResult<String> {
    let Some(new_prefix) = replace_path else {
        return Ok(path_and_query.to_string());
    };
    let rest = path_and_query
        .strip_prefix(matched_prefix)
        .ok_or_else(|| HttpError::InvalidUri("Path and query is broken".to_string()))?;

    let mut out = String::with_capacity(new_prefix.len().saturating_add(rest.len()));
    out.push_str(new_prefix);
    // exactly one '/' between the replacement and the remainder
    match (new_prefix.ends_with('/'), rest.starts_with('/')) {
        (true, true) => out.push_str(&rest[1..]),
        (false, false) if !rest.is_empty() && !rest.starts_with('?') => {
            out.push('/');
            out.push_str(rest);
        }
        _ => out.push_str(rest),
    }
    Ok(out)
}

/// Everything `forward` needs to know about the chosen route
pub struct ForwardTarget<'a> {
    pub route_id: &'a str,
    pub upstream: &'a Upstream,
    pub matched_prefix: &'a str,
    pub replace_path: Option<&'a str>,
}

pub async fn forward(
    mut parts: Parts,
    body: UpstreamBody,
    target: ForwardTarget<'_>,
    pool: &ClientPool,
    metrics: Option<&Arc<Metrics>>,
) -> HttpResult<Response<RespBody>> {
    let start = Instant::now();

    let org_pq = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let new_pq = rewrite_path(org_pq, target.matched_prefix, target.replace_path)?;

    let uri = format!("{}{}", target.upstream.as_str(), new_pq)
        .parse::<Uri>()
        .map_err(|e| HttpError::FailedToGenerateUpstreamRequest(e.to_string()))?;
    parts.uri = uri;
    // The upstream client speaks HTTP/1.1 regardless of the client's version
    parts.version = http::Version::HTTP_11;
    parts.headers.remove(http::header::HOST);

    let out_req = Request::from_parts(parts, body);
    let result = pool.client().request(out_req).await;
    let duration = start.elapsed().as_secs_f64();

    match result {
        Ok(resp) => {
            if let Some(m) = metrics {
                m.record_upstream_request(
                    target.upstream.as_str(),
                    resp.status().as_u16(),
                    target.route_id,
                    duration,
                );
            }
            Ok(resp.map(|b| b.boxed()))
        }
        Err(e) => {
            let error = HttpError::FailedToGetResponseFromUpstream(e.to_string());
            warn!(
                upstream = target.upstream.as_str(),
                route = target.route_id,
                error = %e,
                "upstream request failed"
            );
            if let Some(m) = metrics {
                m.record_upstream_error(target.upstream.as_str(), error.error_type(), target.route_id);
            }
            Err(error)
        }
    }
}
