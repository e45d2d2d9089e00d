//! Bearer-forwarding proxy with a single silent refresh.
//!
//! [`AuthProxy::forward`] runs a fixed, loop-free sequence of stages:
//!
//! 1. [`ForwardStage::Initial`]: the request goes upstream with the caller's access token. Any
//!    status other than `401` is returned unchanged.
//! 2. [`ForwardStage::Refresh`]: on `401`, and only when the caller holds a refresh token, the
//!    refresh endpoint is called once. Any failure ends the sequence with the original `401`.
//! 3. [`ForwardStage::Final`]: the request is reissued once with the new access token, and the
//!    response is returned together with that token so the caller can persist it.
//!
//! Transport failures on the initial or final attempt surface as [`Error::Transport`], never as
//! a synthetic `401`.

mod metrics;
mod refresh;

pub use metrics::ProxyMetrics;

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, SET_COOKIE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialCookies, CredentialPair, TokenSecret},
	config::ProxyConfig,
	error::ConfigError,
	http::{RequestTimeout, UpstreamHttpClient, map_transport_error},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Proxy specialized for the crate's default reqwest transport.
pub type ReqwestAuthProxy = AuthProxy<ReqwestHttpClient>;

/// Stage of the forward sequence that produced a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForwardStage {
	/// First upstream attempt with the caller's access token.
	Initial,
	/// Refresh endpoint call.
	Refresh,
	/// Single retry with the refreshed access token.
	Final,
}
impl ForwardStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ForwardStage::Initial => "initial",
			ForwardStage::Refresh => "refresh",
			ForwardStage::Final => "final",
		}
	}
}

/// Method, headers, body, and timeout of a request to forward.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	/// HTTP method.
	pub method: Method,
	/// Caller headers; any `Authorization` header is replaced by the bearer credential.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Vec<u8>,
	/// Per-request timeout overriding [`ProxyConfig::request_timeout`].
	pub timeout: Option<StdDuration>,
}
impl RequestOptions {
	/// Creates options for `method` with no headers or body.
	pub fn new(method: Method) -> Self {
		Self { method, headers: HeaderMap::new(), body: Vec::new(), timeout: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	/// Shorthand for a `POST` request.
	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type` unless already present.
	pub fn with_json<T>(mut self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(value)?;
		self.headers
			.entry(CONTENT_TYPE)
			.or_insert(HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Bounds this request's round trip.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	fn to_request(
		&self,
		url: &Url,
		access_token: &TokenSecret,
		default_timeout: Option<StdDuration>,
	) -> Result<HttpRequest, ConfigError> {
		let mut builder = Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.header(AUTHORIZATION, access_token.bearer());

		for (name, value) in self.headers.iter().filter(|(name, _)| **name != AUTHORIZATION) {
			builder = builder.header(name, value);
		}

		let mut request = builder.body(self.body.clone())?;

		if let Some(timeout) = self.timeout.or(default_timeout) {
			request.extensions_mut().insert(RequestTimeout(timeout));
		}

		Ok(request)
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self::get()
	}
}

/// Result of [`AuthProxy::forward`].
#[derive(Debug)]
pub struct ForwardOutcome {
	/// Upstream response, unchanged.
	pub response: HttpResponse,
	/// New access token minted by the silent refresh; the caller must persist it.
	pub refreshed_access_token: Option<TokenSecret>,
	/// Stage that produced [`Self::response`].
	pub stage: ForwardStage,
}
impl ForwardOutcome {
	fn upstream(response: HttpResponse) -> Self {
		Self { response, refreshed_access_token: None, stage: ForwardStage::Initial }
	}

	/// Upstream status code.
	pub fn status(&self) -> StatusCode {
		self.response.status()
	}

	/// `Set-Cookie` value persisting the refreshed access token, if a refresh happened.
	pub fn set_cookie(&self, cookies: &CredentialCookies) -> Option<String> {
		self.refreshed_access_token.as_ref().map(|token| cookies.access_cookie(token))
	}

	/// Consumes the outcome, appending the refreshed access cookie to the response headers.
	pub fn into_response(self, cookies: &CredentialCookies) -> Result<HttpResponse> {
		let cookie = self.set_cookie(cookies);
		let mut response = self.response;

		if let Some(cookie) = cookie {
			let value = HeaderValue::try_from(cookie)
				.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

			response.headers_mut().append(SET_COOKIE, value);
		}

		Ok(response)
	}
}

/// Forwards requests to the upstream API, recovering once from an expired access token.
///
/// The proxy holds no per-caller state: credentials arrive with each call and a refreshed token
/// leaves with the [`ForwardOutcome`]. Calls may run fully in parallel.
pub struct AuthProxy<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	/// HTTP client wrapper used for every upstream request.
	pub http_client: Arc<C>,
	/// Upstream location and timing.
	pub config: ProxyConfig,
	/// Shared counters for forward and refresh outcomes.
	pub metrics: Arc<ProxyMetrics>,
}
impl<C> AuthProxy<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	/// Creates a proxy that reuses the caller-provided transport.
	pub fn with_http_client(config: ProxyConfig, http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into(), config, metrics: Default::default() }
	}

	/// Forwards a request to `url`, attaching the caller's bearer credential.
	///
	/// Fails with [`Error::Unauthenticated`] before any network call when no access token is
	/// present.
	pub async fn forward(
		&self,
		url: Url,
		options: RequestOptions,
		credentials: &CredentialPair,
	) -> Result<ForwardOutcome> {
		const KIND: FlowKind = FlowKind::Forward;

		let span = FlowSpan::new(KIND, "forward");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_stages(&url, &options, credentials)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Forwards a request to `path` resolved against the configured base URL.
	pub async fn forward_path(
		&self,
		path: &str,
		options: RequestOptions,
		credentials: &CredentialPair,
	) -> Result<ForwardOutcome> {
		let url = self.config.endpoint(path)?;

		self.forward(url, options, credentials).await
	}

	async fn run_stages(
		&self,
		url: &Url,
		options: &RequestOptions,
		credentials: &CredentialPair,
	) -> Result<ForwardOutcome> {
		let access_token = credentials.access_token().ok_or(Error::Unauthenticated)?;

		self.metrics.record_forward();

		let initial = self.send(ForwardStage::Initial, url, options, access_token).await?;

		if initial.status() != StatusCode::UNAUTHORIZED {
			return Ok(ForwardOutcome::upstream(initial));
		}

		let Some(refresh_token) = credentials.refresh_token() else {
			obs::refresh_unavailable();

			return Ok(ForwardOutcome::upstream(initial));
		};
		let fresh = match self.refresh_access_token(refresh_token).await {
			Ok(token) => token,
			Err(err) => {
				obs::refresh_declined(&err);

				return Ok(ForwardOutcome::upstream(initial));
			},
		};

		self.metrics.record_retry();

		let retried = self.send(ForwardStage::Final, url, options, &fresh).await?;

		Ok(ForwardOutcome {
			response: retried,
			refreshed_access_token: Some(fresh),
			stage: ForwardStage::Final,
		})
	}

	async fn send(
		&self,
		stage: ForwardStage,
		url: &Url,
		options: &RequestOptions,
		access_token: &TokenSecret,
	) -> Result<HttpResponse> {
		let request = options.to_request(url, access_token, self.config.request_timeout)?;

		FlowSpan::new(FlowKind::Forward, stage.as_str()).instrument(self.execute(request)).await
	}

	pub(crate) async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
		let handle = self.http_client.handle();

		handle.call(request).await.map_err(map_transport_error)
	}
}
#[cfg(feature = "reqwest")]
impl AuthProxy<ReqwestHttpClient> {
	/// Creates a proxy with its own reqwest transport.
	pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(config, ReqwestHttpClient::try_new()?))
	}
}
impl<C> Clone for AuthProxy<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			config: self.config.clone(),
			metrics: Arc::clone(&self.metrics),
		}
	}
}
impl<C> Debug for AuthProxy<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthProxy").field("config", &self.config).finish()
	}
}
