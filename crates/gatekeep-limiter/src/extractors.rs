//! Client address extraction

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use serde::{Deserialize, Serialize};

/// How the server is exposed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
	/// Clients connect directly
	#[default]
	Standalone,
	/// Behind a reverse proxy that sets forwarding headers
	Proxy,
}

/// Extract client IP from request based on ServerMode
///
/// - Standalone mode: Use peer IP directly from ConnectInfo
/// - Proxy mode: Check forwarding headers first
pub fn extract_client_ip<B>(req: &Request<B>, mode: ServerMode) -> Option<IpAddr> {
	let peer = || req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip());
	match mode {
		ServerMode::Standalone => peer(),
		ServerMode::Proxy => extract_from_xff(req)
			.or_else(|| extract_from_x_real_ip(req))
			.or_else(|| extract_from_forwarded(req))
			.or_else(peer),
	}
}

/// Extract IP from X-Forwarded-For header
fn extract_from_xff<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| {
			// The leftmost entry is the original client
			s.split(',').next().map(str::trim).and_then(|ip| ip.parse().ok())
		})
}

/// Extract IP from X-Real-IP header
fn extract_from_x_real_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-real-ip")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.trim().parse().ok())
}

/// Extract IP from Forwarded header (RFC 7239)
fn extract_from_forwarded<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers().get("forwarded").and_then(|h| h.to_str().ok()).and_then(|s| {
		// "for=192.0.2.60;proto=http;by=203.0.113.43" or "for=\"[2001:db8::1]\""
		s.split([';', ','])
			.map(str::trim)
			.find_map(|part| part.get(..4).filter(|p| p.eq_ignore_ascii_case("for=")).map(|_| &part[4..]))
			.and_then(|value| value.trim_matches('"').trim_matches(['[', ']']).parse().ok())
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;

	fn request(headers: &[(&str, &str)]) -> Request<Body> {
		let mut builder = Request::builder().uri("/");
		for (name, value) in headers {
			builder = builder.header(*name, *value);
		}
		let mut req = builder.body(Body::empty()).unwrap();
		req.extensions_mut().insert(ConnectInfo("127.0.0.1:4000".parse::<SocketAddr>().unwrap()));
		req
	}

	#[test]
	fn test_standalone_ignores_headers() {
		let req = request(&[("x-forwarded-for", "203.0.113.1")]);
		assert_eq!(extract_client_ip(&req, ServerMode::Standalone), Some("127.0.0.1".parse().unwrap()));
	}

	#[test]
	fn test_proxy_headers() {
		let req = request(&[("x-forwarded-for", "203.0.113.1, 10.0.0.1")]);
		assert_eq!(extract_client_ip(&req, ServerMode::Proxy), Some("203.0.113.1".parse().unwrap()));

		let req = request(&[("x-real-ip", " 198.51.100.4 ")]);
		assert_eq!(extract_client_ip(&req, ServerMode::Proxy), Some("198.51.100.4".parse().unwrap()));

		let req = request(&[("forwarded", "proto=https;For=\"[2001:db8::1]\"")]);
		assert_eq!(extract_client_ip(&req, ServerMode::Proxy), Some("2001:db8::1".parse().unwrap()));

		let req = request(&[]);
		assert_eq!(extract_client_ip(&req, ServerMode::Proxy), Some("127.0.0.1".parse().unwrap()));
	}
}

// vim: ts=4
