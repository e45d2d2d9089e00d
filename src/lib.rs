//! Edge guards for the Zharqyn Bala platform: a bearer-forwarding proxy that performs a single
//! silent credential refresh on `401`, and a fixed-window per-route rate limiter.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod proxy;
pub mod rate_limit;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests and demos.

	pub use crate::_prelude::*;

	// self
	use crate::{config::ProxyConfig, http::ReqwestHttpClient, proxy::AuthProxy};

	/// Proxy type alias used by reqwest-backed integration tests.
	pub type ReqwestTestProxy = AuthProxy<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates served by
	/// `httpmock` and gives up on a silent mock after a few seconds.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(std::time::Duration::from_secs(5))
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs an [`AuthProxy`] that forwards to `base_url` over the reqwest transport.
	pub fn build_reqwest_test_proxy(base_url: &str) -> ReqwestTestProxy {
		let config = ProxyConfig::new(base_url).expect("Mock upstream base URL should parse.");

		AuthProxy::with_http_client(config, test_reqwest_http_client())
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
