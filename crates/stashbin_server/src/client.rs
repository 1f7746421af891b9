//! Client identity used to key rate-limit buckets.

use crate::AppState;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Identity reported when neither headers nor the socket name a peer.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Raw address string of the requesting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

/// Address taken from proxy headers, first hop wins.
fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok());

    forwarded_for
        .or(real_ip)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve the client identity from request parts.
///
/// # Arguments
/// - `parts`: Request head, possibly carrying `ConnectInfo<SocketAddr>`.
/// - `trust_forwarded_headers`: Consult `X-Forwarded-For`/`X-Real-IP` first.
pub fn client_address(parts: &Parts, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        if let Some(address) = forwarded_address(&parts.headers) {
            return address;
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(client_address(parts, state.config.trust_forwarded_headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)], peer: Option<SocketAddr>) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).expect("request").into_parts();
        if let Some(peer) = peer {
            parts.extensions.insert(ConnectInfo(peer));
        }
        parts
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let parts = parts_with(&[("x-forwarded-for", " 203.0.113.9 , 10.0.0.1")], None);
        assert_eq!(client_address(&parts, true), "203.0.113.9");
    }

    #[test]
    fn real_ip_is_used_without_forwarded_for() {
        let parts = parts_with(&[("x-real-ip", "2001:db8::7")], None);
        assert_eq!(client_address(&parts, true), "2001:db8::7");
    }

    #[test]
    fn untrusted_headers_fall_back_to_peer_address() {
        let peer = SocketAddr::from(([192, 0, 2, 4], 51000));
        let parts = parts_with(&[("x-forwarded-for", "203.0.113.9")], Some(peer));
        assert_eq!(client_address(&parts, false), "192.0.2.4");
    }

    #[test]
    fn missing_everything_is_unknown() {
        let parts = parts_with(&[], None);
        assert_eq!(client_address(&parts, true), UNKNOWN_CLIENT);
    }
}
