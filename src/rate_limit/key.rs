//! Caller identity and the composite identity+route key the limiter counts under.

// std
use std::net::{IpAddr, SocketAddr};
// self
use crate::{
	_prelude::*,
	auth::{RouteId, UserId},
};

/// Who is calling, as far as quota accounting is concerned.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
	/// Authenticated user.
	User(UserId),
	/// Anonymous caller identified by network address.
	Address(IpAddr),
	/// Anonymous caller without a usable address; all such callers share one bucket.
	Unknown,
}
impl Identity {
	/// Prefers the authenticated user, falling back to the network address.
	pub fn resolve(user: Option<UserId>, address: Option<IpAddr>) -> Self {
		match (user, address) {
			(Some(user), _) => Self::User(user),
			(None, Some(address)) => Self::Address(address.to_canonical()),
			(None, None) => Self::Unknown,
		}
	}

	/// Resolves the identity of a caller behind a reverse proxy.
	///
	/// The first `X-Forwarded-For` hop wins over the socket peer address.
	pub fn from_forwarded(
		user: Option<UserId>,
		x_forwarded_for: Option<&str>,
		peer: Option<IpAddr>,
	) -> Self {
		let forwarded = x_forwarded_for
			.and_then(|header| header.split(',').next())
			.and_then(parse_address);

		Self::resolve(user, forwarded.or(peer))
	}
}
impl Display for Identity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::User(user) => write!(f, "user:{user}"),
			Self::Address(address) => write!(f, "ip:{address}"),
			Self::Unknown => f.write_str("ip:unknown"),
		}
	}
}

/// Composite key of identity and route; quota is tracked per route, not per caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);
impl RateLimitKey {
	/// Combines `identity` with `route`.
	pub fn new(identity: &Identity, route: &RouteId) -> Self {
		Self(format!("{identity}|{route}"))
	}

	/// Wraps a pre-built key, e.g. one read from an external store.
	pub fn from_raw(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}
}
impl AsRef<str> for RateLimitKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for RateLimitKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn parse_address(raw: &str) -> Option<IpAddr> {
	let raw = raw.trim();

	raw.parse::<IpAddr>().ok().or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

#[cfg(test)]
mod tests {
	// std
	use std::net::Ipv4Addr;
	// self
	use super::*;

	fn route() -> RouteId {
		RouteId::new("POST:/tests/submit").expect("Route fixture should be valid.")
	}

	#[test]
	fn user_identity_wins_over_address() {
		let user = UserId::new("user-7").expect("User fixture should be valid.");
		let identity = Identity::resolve(Some(user), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

		assert_eq!(
			RateLimitKey::new(&identity, &route()).as_ref(),
			"user:user-7|POST:/tests/submit"
		);
	}

	#[test]
	fn forwarded_header_wins_over_peer() {
		let identity = Identity::from_forwarded(
			None,
			Some(" 203.0.113.9:443 , 10.0.0.1"),
			Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
		);

		assert_eq!(identity.to_string(), "ip:203.0.113.9");

		let fallback =
			Identity::from_forwarded(None, Some("garbage"), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

		assert_eq!(fallback.to_string(), "ip:127.0.0.1");
		assert_eq!(Identity::from_forwarded(None, None, None), Identity::Unknown);
	}

	#[test]
	fn mapped_ipv6_addresses_collapse_to_ipv4() {
		let mapped: IpAddr = "::ffff:198.51.100.4".parse().expect("Mapped address should parse.");

		assert_eq!(Identity::resolve(None, Some(mapped)).to_string(), "ip:198.51.100.4");
	}

	#[test]
	fn keys_differ_per_route() {
		let identity = Identity::Unknown;
		let other = RouteId::new("GET:/children").expect("Route fixture should be valid.");

		assert_ne!(RateLimitKey::new(&identity, &route()), RateLimitKey::new(&identity, &other));
	}
}
