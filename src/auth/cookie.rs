//! Cookie transport for credential pairs.
//!
//! Browsers hold both tokens in `HttpOnly` cookies. The proxy reads them from the `Cookie`
//! header and, after a silent refresh, hands back the `Set-Cookie` value that replaces the
//! access token. Nothing here touches a persistent store.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
};

/// `SameSite` attribute applied to issued cookies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	/// Cookie is only sent for same-site requests.
	Strict,
	/// Cookie is sent for same-site requests and top-level navigations.
	#[default]
	Lax,
	/// Cookie is sent for all requests; requires `Secure`.
	None,
}
impl SameSite {
	/// Attribute value as written into `Set-Cookie`.
	pub const fn as_str(self) -> &'static str {
		match self {
			SameSite::Strict => "Strict",
			SameSite::Lax => "Lax",
			SameSite::None => "None",
		}
	}
}

/// Names and attributes of the cookies carrying credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCookies {
	/// Cookie holding the access token.
	pub access_name: String,
	/// Cookie holding the refresh token.
	pub refresh_name: String,
	/// `Path` attribute for issued cookies.
	pub path: String,
	/// Whether issued cookies carry `Secure`.
	pub secure: bool,
	/// `SameSite` attribute for issued cookies.
	pub same_site: SameSite,
	/// `Max-Age` of a freshly issued access cookie.
	pub access_max_age: Duration,
}
impl CredentialCookies {
	const DEFAULT_ACCESS_MAX_AGE: Duration = Duration::minutes(15);

	/// Overrides the cookie names.
	pub fn with_names(mut self, access: impl Into<String>, refresh: impl Into<String>) -> Self {
		self.access_name = access.into();
		self.refresh_name = refresh.into();

		self
	}

	/// Toggles the `Secure` attribute.
	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;

		self
	}

	/// Overrides the `SameSite` attribute.
	pub fn with_same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = same_site;

		self
	}

	/// Overrides the access cookie lifetime; negative values clamp to zero.
	pub fn with_access_max_age(mut self, max_age: Duration) -> Self {
		self.access_max_age = if max_age.is_negative() { Duration::ZERO } else { max_age };

		self
	}

	/// Extracts the credential pair from a raw `Cookie` header value.
	pub fn extract(&self, cookie_header: &str) -> CredentialPair {
		let mut pair = CredentialPair::default();

		for (name, value) in cookie_header
			.split(';')
			.filter_map(|part| part.split_once('='))
			.map(|(name, value)| (name.trim(), value.trim().trim_matches('"')))
		{
			if name == self.access_name && pair.access_token.is_none() {
				pair.access_token = TokenSecret::non_empty(value);
			} else if name == self.refresh_name && pair.refresh_token.is_none() {
				pair.refresh_token = TokenSecret::non_empty(value);
			}
		}

		pair
	}

	/// Renders the `Set-Cookie` value persisting a refreshed access token.
	pub fn access_cookie(&self, token: &TokenSecret) -> String {
		let mut cookie = format!(
			"{}={}; Path={}; Max-Age={}; HttpOnly; SameSite={}",
			self.access_name,
			token.expose(),
			self.path,
			self.access_max_age.whole_seconds(),
			self.same_site.as_str(),
		);

		if self.secure || matches!(self.same_site, SameSite::None) {
			cookie.push_str("; Secure");
		}

		cookie
	}
}
impl Default for CredentialCookies {
	fn default() -> Self {
		Self {
			access_name: "access_token".into(),
			refresh_name: "refresh_token".into(),
			path: "/".into(),
			secure: false,
			same_site: SameSite::Lax,
			access_max_age: Self::DEFAULT_ACCESS_MAX_AGE,
		}
	}
}
