//! The slice of an inbound request the rules look at.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use serde::Serialize;

use crate::gate::AdmissionGate;

/// Proxy header consulted only when forwarding is trusted.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Request attributes handed to a decision provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFacts {
    /// HTTP method.
    pub method: String,
    /// Request path, still percent-encoded.
    pub path: String,
    /// Raw query string without the leading `?`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// `User-Agent` header, if present and valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Client address: the socket peer, or the proxy-appended
    /// `X-Forwarded-For` entry when forwarding is trusted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
}

impl RequestFacts {
    /// Collect facts from request parts.
    ///
    /// The peer address is read from `ConnectInfo<SocketAddr>` when the server
    /// was started with connect info. `X-Forwarded-For` is ignored unless
    /// `trust_forwarded` is set; then its rightmost entry, the one the
    /// fronting proxy appended, replaces the peer.
    pub fn from_parts(parts: &Parts, trust_forwarded: bool) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let forwarded = if trust_forwarded {
            parts
                .headers
                .get(FORWARDED_FOR)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.rsplit(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        } else {
            None
        };

        Self {
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
            ip: forwarded.or(peer),
        }
    }

    /// Key the sliding window counts under.
    pub fn client_key(&self) -> String {
        self.ip.map_or_else(|| "unknown".to_string(), |ip| format!("ip:{ip}"))
    }
}

/// Extracts facts using the gate's forwarding policy from router state.
impl<S> FromRequestParts<S> for RequestFacts
where
    Arc<AdmissionGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AdmissionGate>::from_ref(state);
        Ok(gate.facts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    fn with_peer(mut request: Request<()>, peer: [u8; 4]) -> Request<()> {
        let _ = request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 4000))));
        request
    }

    #[test]
    fn peer_used_when_forwarding_untrusted() {
        let request = Request::builder()
            .uri("/ws?token=1")
            .header(FORWARDED_FOR, "203.0.113.9, 10.0.0.1")
            .header(USER_AGENT, "Mozilla/5.0")
            .body(())
            .unwrap();

        let facts = RequestFacts::from_parts(&parts(with_peer(request, [127, 0, 0, 1])), false);
        assert_eq!(facts.method, "GET");
        assert_eq!(facts.path, "/ws");
        assert_eq!(facts.query.as_deref(), Some("token=1"));
        assert_eq!(facts.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(facts.client_key(), "ip:127.0.0.1");
    }

    #[test]
    fn trusted_forwarding_takes_rightmost_entry() {
        let request = Request::builder()
            .uri("/ws")
            .header(FORWARDED_FOR, "203.0.113.9, 198.51.100.20")
            .body(())
            .unwrap();
        let facts = RequestFacts::from_parts(&parts(with_peer(request, [10, 0, 0, 1])), true);
        assert_eq!(facts.client_key(), "ip:198.51.100.20");
    }

    #[test]
    fn trusted_forwarding_without_header_uses_peer() {
        let request = Request::builder().uri("/ws").body(()).unwrap();
        let facts = RequestFacts::from_parts(&parts(with_peer(request, [10, 0, 0, 1])), true);
        assert_eq!(facts.client_key(), "ip:10.0.0.1");
    }

    #[test]
    fn peer_used_when_header_invalid() {
        let request = Request::builder()
            .uri("/")
            .header(FORWARDED_FOR, "not-an-ip")
            .body(())
            .unwrap();

        let facts = RequestFacts::from_parts(&parts(with_peer(request, [192, 0, 2, 4])), true);
        assert_eq!(facts.client_key(), "ip:192.0.2.4");
    }

    #[test]
    fn unknown_without_address() {
        let request = Request::builder().uri("/").body(()).unwrap();
        let facts = RequestFacts::from_parts(&parts(request), true);
        assert!(facts.ip.is_none());
        assert!(facts.user_agent.is_none());
        assert_eq!(facts.client_key(), "unknown");
    }
}
