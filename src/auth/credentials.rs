//! Caller-held credential pair presented to the proxy on every call.

// crates.io
use oauth2::http::{HeaderMap, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{CredentialCookies, TokenSecret},
};

/// Access/refresh tokens as received from the caller's request context.
///
/// Either half may be missing: the proxy fails fast without an access token and skips the
/// silent refresh without a refresh token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialPair {
	/// Short-lived credential presented on every upstream call.
	pub access_token: Option<TokenSecret>,
	/// Longer-lived credential used only to mint a new access token.
	pub refresh_token: Option<TokenSecret>,
}
impl CredentialPair {
	/// Creates a pair holding both tokens.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::non_empty(access_token),
			refresh_token: TokenSecret::non_empty(refresh_token),
		}
	}

	/// Creates a pair that only carries an access token.
	pub fn access_only(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::non_empty(access_token), refresh_token: None }
	}

	/// Reads the pair from request headers.
	///
	/// Cookies named by `cookies` take precedence; an `Authorization: Bearer` header is used as
	/// the access token when no access cookie is present.
	pub fn from_headers(headers: &HeaderMap, cookies: &CredentialCookies) -> Self {
		let mut pair = headers
			.get_all(oauth2::http::header::COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.map(|raw| cookies.extract(raw))
			.fold(Self::default(), |acc, next| Self {
				access_token: acc.access_token.or(next.access_token),
				refresh_token: acc.refresh_token.or(next.refresh_token),
			});

		if pair.access_token.is_none() {
			pair.access_token = headers
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.and_then(parse_bearer);
		}

		pair
	}

	/// Access token, if the caller presented one.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Refresh token, if the caller presented one.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}
}

fn parse_bearer(raw: &str) -> Option<TokenSecret> {
	let (scheme, token) = raw.trim().split_once(' ')?;

	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}

	TokenSecret::non_empty(token.trim())
}
