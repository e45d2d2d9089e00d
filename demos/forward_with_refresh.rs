//! Demonstrates forwarding a call whose access token has expired: the proxy refreshes it once
//! against a mock upstream, retries, and hands back the new token as a `Set-Cookie` value.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use zharqyn_edge::{
	auth::{CredentialCookies, CredentialPair},
	config::ProxyConfig,
	http::ReqwestHttpClient,
	http_types::{HeaderMap, HeaderValue, header::COOKIE},
	proxy::{ReqwestAuthProxy, RequestOptions},
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/children").header("authorization", "Bearer demo-expired");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":\"demo-fresh\"}");
		})
		.await;
	let children = server
		.mock_async(|when, then| {
			when.method(GET).path("/children").header("authorization", "Bearer demo-fresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"id\":1,\"name\":\"Aru\"}]");
		})
		.await;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let config = ProxyConfig::new(&server.base_url())?;
	let proxy = ReqwestAuthProxy::with_http_client(config, http_client);
	let cookies = CredentialCookies::default();
	let mut inbound = HeaderMap::new();

	inbound.insert(
		COOKIE,
		HeaderValue::from_static("access_token=demo-expired; refresh_token=demo-refresh"),
	);

	let credentials = CredentialPair::from_headers(&inbound, &cookies);
	let outcome = proxy.forward_path("/children", RequestOptions::get(), &credentials).await?;

	println!(
		"Answered by the {} attempt with status {}.",
		outcome.stage.as_str(),
		outcome.status()
	);

	if let Some(cookie) = outcome.set_cookie(&cookies) {
		println!("Set-Cookie: {cookie}");
	}

	println!("Body: {}", String::from_utf8_lossy(outcome.response.body()));

	expired.assert_async().await;
	refresh.assert_async().await;
	children.assert_async().await;

	Ok(())
}
