//! Crate-level error types shared by the proxy, the rate limiter, and configuration loaders.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The caller did not present an access token.
	#[error("Request is not authenticated.")]
	Unauthenticated,
}
impl Error {
	/// HTTP status a caller should answer with when surfacing this error.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Unauthenticated => 401,
			Self::Transport(_) => 502,
			Self::Config(_) => 500,
		}
	}

	/// Builds the user-facing JSON body for this error.
	///
	/// Internal details (URLs, transport messages) never leak into the body.
	pub fn error_body(&self) -> ErrorBody {
		let message = match self {
			Self::Unauthenticated => "Authentication required.",
			Self::Transport(_) => "Upstream service is unavailable.",
			Self::Config(_) => "Internal server error.",
		};

		ErrorBody::new(self.status_code(), message)
	}
}

/// Structured error body surfaced to HTTP clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
	/// HTTP status code mirrored into the body.
	pub status_code: u16,
	/// Human-readable message that is safe to show to end users.
	pub message: String,
	/// Seconds to wait before retrying, only present for throttled requests.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}
impl ErrorBody {
	/// Creates a body without a retry hint.
	pub fn new(status_code: u16, message: impl Into<String>) -> Self {
		Self { status_code, message: message.into(), retry_after: None }
	}

	/// Attaches a retry hint in seconds.
	pub fn with_retry_after(mut self, seconds: u64) -> Self {
		self.retry_after = Some(seconds);

		self
	}

	/// Serializes the body to JSON bytes.
	pub fn to_json(&self) -> Vec<u8> {
		// A struct of plain strings and integers always serializes.
		serde_json::to_vec(self).unwrap_or_default()
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
	/// Upstream base URL cannot be parsed or cannot carry paths.
	#[error("Upstream base URL `{url}` is invalid.")]
	InvalidBaseUrl {
		/// Offending value.
		url: String,
		/// Underlying parsing failure, if the value did not parse at all.
		#[source]
		source: Option<url::ParseError>,
	},
	/// Upstream path cannot be joined onto the base URL.
	#[error("Upstream path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Required environment variable is unset or blank.
	#[error("Environment variable `{key}` is required.")]
	MissingEnv {
		/// Variable name.
		key: &'static str,
	},
	/// Environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{key}` holds an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
		/// Raw value.
		value: String,
	},
	/// Rate limit window must be positive.
	#[error("Rate limit window must be positive.")]
	NonPositiveWindow,
	/// Rate limit window exceeds the supported maximum.
	#[error("Rate limit window of {window} exceeds the maximum of {max}.")]
	WindowTooLong {
		/// Requested window.
		window: Duration,
		/// Longest accepted window.
		max: Duration,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream API.")]
	Io(#[from] std::io::Error),
	/// Transport reported a failure without a typed source.
	#[error("HTTP client error occurred while calling the upstream API: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Reasons a silent refresh produced no new access token.
///
/// The proxy downgrades every variant to "no new token" and returns the original `401`.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the refresh token with status {status}.")]
	Rejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// Refresh endpoint responded with malformed JSON.
	#[error("Refresh endpoint returned malformed JSON.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Refresh endpoint succeeded but carried no usable access token.
	#[error("Refresh endpoint response did not contain an access token.")]
	MissingAccessToken,
	/// Refresh request could not be built or sent.
	#[error(transparent)]
	Request(#[from] Error),
}
