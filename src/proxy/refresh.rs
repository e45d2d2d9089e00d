//! Silent refresh call against the upstream `auth/refresh` endpoint.
//!
//! The endpoint takes `{"refreshToken": ...}` and answers `{"accessToken": ...}`. A single round
//! trip bounded by [`ProxyConfig::refresh_timeout`](crate::config::ProxyConfig) is made per call;
//! this module never retries.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, RefreshError},
	http::{RequestTimeout, UpstreamHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	proxy::{AuthProxy, ForwardStage},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
	#[serde(default)]
	access_token: Option<String>,
}

impl<C> AuthProxy<C>
where
	C: ?Sized + UpstreamHttpClient,
{
	/// Exchanges `refresh_token` for a new access token with exactly one upstream call.
	pub async fn refresh_access_token(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<TokenSecret, RefreshError> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, ForwardStage::Refresh.as_str());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_refresh_attempt();

		let result = span.instrument(self.exchange_refresh_token(refresh_token)).await;

		match &result {
			Ok(token) => {
				self.metrics.record_refresh_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				obs::refresh_succeeded(&token.fingerprint());
			},
			Err(_) => {
				self.metrics.record_refresh_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn exchange_refresh_token(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<TokenSecret, RefreshError> {
		let request = self.refresh_request(refresh_token).map_err(Error::from)?;
		let response = self.execute(request).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(RefreshError::Rejected { status: status.as_u16() });
		}

		parse_refresh_response(response.body())
	}

	fn refresh_request(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<oauth2::HttpRequest, ConfigError> {
		let url = self.config.refresh_url()?;
		let body = serde_json::to_vec(&RefreshRequest { refresh_token: refresh_token.expose() })?;
		let mut request = Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.body(body)?;

		request.extensions_mut().insert(RequestTimeout(self.config.refresh_timeout));

		Ok(request)
	}
}

fn parse_refresh_response(body: &[u8]) -> Result<TokenSecret, RefreshError> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let parsed: RefreshResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| RefreshError::Malformed { source })?;

	parsed.access_token.and_then(TokenSecret::non_empty).ok_or(RefreshError::MissingAccessToken)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_body_uses_camel_case() {
		let body = serde_json::to_string(&RefreshRequest { refresh_token: "r-1" })
			.expect("Refresh body should serialize.");

		assert_eq!(body, r#"{"refreshToken":"r-1"}"#);
	}

	#[test]
	fn refresh_response_requires_a_token() {
		let token = parse_refresh_response(br#"{"accessToken":"a-2","user":{"id":1}}"#)
			.expect("Well-formed response should yield a token.");

		assert_eq!(token.expose(), "a-2");
		assert!(matches!(
			parse_refresh_response(br#"{"accessToken":""}"#),
			Err(RefreshError::MissingAccessToken)
		));
		assert!(matches!(parse_refresh_response(b"{}"), Err(RefreshError::MissingAccessToken)));
	}

	#[test]
	fn malformed_refresh_response_reports_path() {
		let err = parse_refresh_response(br#"{"accessToken":42}"#)
			.expect_err("Numeric token must be rejected.");

		match err {
			RefreshError::Malformed { source } =>
				assert_eq!(source.path().to_string(), "accessToken"),
			other => panic!("Unexpected error: {other:?}."),
		}
	}
}
