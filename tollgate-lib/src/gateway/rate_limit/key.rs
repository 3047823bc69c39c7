use std::net::{IpAddr, SocketAddr};

use http::HeaderMap;

use crate::gateway::headers::names;
use crate::limiter::{IP_KEY_PREFIX, USER_KEY_PREFIX};

/// Rate-limit key for a request
///
/// `user:<id>` when the gateway resolved a caller identity, `ip:<addr>`
/// otherwise. The forwarded-for chain is consulted only when trusted.
pub fn limit_key(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    let user_id = headers
        .get(names::X_USER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty());
    if let Some(id) = user_id {
        return format!("{USER_KEY_PREFIX}{id}");
    }
    format!("{IP_KEY_PREFIX}{}", client_ip(headers, peer, trust_forwarded_for))
}

fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get(names::X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.ip()
}
