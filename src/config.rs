//! Environment-driven configuration for the proxy and the rate limiter.
//!
//! Every loader has a `from_lookup` form taking a variable resolver so configuration can be
//! assembled from sources other than the process environment (tests, secret managers).

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Variable holding the upstream API base URL.
pub const API_URL_ENV: &str = "API_URL";
/// Variable holding the refresh round-trip timeout in milliseconds.
pub const REFRESH_TIMEOUT_MS_ENV: &str = "API_REFRESH_TIMEOUT_MS";

/// Upstream location and timing for [`AuthProxy`](crate::proxy::AuthProxy).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
	base_url: Url,
	/// Path of the refresh endpoint relative to the base URL.
	pub refresh_path: String,
	/// Upper bound for the refresh round trip.
	pub refresh_timeout: StdDuration,
	/// Optional upper bound for forwarded requests; `None` defers to the transport.
	pub request_timeout: Option<StdDuration>,
}
impl ProxyConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "auth/refresh";
	/// Default refresh round-trip timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

	/// Creates a configuration for the provided upstream base URL.
	pub fn new(base_url: &str) -> Result<Self, ConfigError> {
		Ok(Self {
			base_url: normalize_base(base_url)?,
			refresh_path: Self::DEFAULT_REFRESH_PATH.into(),
			refresh_timeout: Self::DEFAULT_REFRESH_TIMEOUT,
			request_timeout: None,
		})
	}

	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads the configuration through `lookup`.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let base = lookup(API_URL_ENV)
			.filter(|value| !value.trim().is_empty())
			.ok_or(ConfigError::MissingEnv { key: API_URL_ENV })?;
		let mut config = Self::new(&base)?;

		if let Some(ms) = parse_env::<u64, _>(&lookup, REFRESH_TIMEOUT_MS_ENV)? {
			config.refresh_timeout = StdDuration::from_millis(ms);
		}

		Ok(config)
	}

	/// Overrides the refresh endpoint path.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh round-trip timeout.
	pub fn with_refresh_timeout(mut self, timeout: StdDuration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Bounds every forwarded request.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Normalized base URL (always ends with `/`).
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Resolves `path` below the base URL; leading slashes never escape the base path.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url.join(path.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidPath { path: path.to_owned(), source }
		})
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.refresh_path)
	}
}

fn normalize_base(raw: &str) -> Result<Url, ConfigError> {
	let mut url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
		url: raw.to_owned(),
		source: Some(source),
	})?;

	if url.cannot_be_a_base() {
		return Err(ConfigError::InvalidBaseUrl { url: raw.to_owned(), source: None });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url.set_query(None);
	url.set_fragment(None);

	Ok(url)
}

/// Reads and parses an optional variable; blank values count as unset.
pub(crate) fn parse_env<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	F: Fn(&str) -> Option<String>,
{
	match lookup(key) {
		Some(value) if !value.trim().is_empty() => value
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::InvalidEnv { key, value }),
		_ => Ok(None),
	}
}
