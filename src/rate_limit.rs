//! Fixed-window rate limiting per caller and route.
//!
//! [`FixedWindowLimiter`] is the in-process implementation; [`RateLimitPolicy`] is the seam for
//! limiters backed by an external store. Every decision carries the quota metadata callers
//! surface as `X-RateLimit-*` headers, and rejections add a `Retry-After` hint.
//!
//! The window is fixed, not sliding: a caller may spend a full budget just before a window
//! closes and another one right after it.

pub mod config;
pub mod key;
pub mod limiter;

pub use config::*;
pub use key::*;
pub use limiter::*;

// crates.io
use oauth2::http::{HeaderMap, HeaderName, HeaderValue, header::RETRY_AFTER};
// self
use crate::{_prelude::*, auth::RouteId, error::ErrorBody};

/// Header carrying the request budget of the window.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Header carrying the requests left in the window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Header carrying the window reset instant in seconds since the Unix epoch.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Boxed future returned by [`RateLimitPolicy::evaluate`].
pub type RateLimitFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RateLimitDecision>> + 'a + Send>>;

/// Strategy deciding whether a request may proceed.
pub trait RateLimitPolicy
where
	Self: Send + Sync,
{
	/// Counts the request described by `context` and returns the decision.
	fn evaluate(&self, context: &RateLimitContext) -> RateLimitFuture<'_>;
}

/// Request description handed to a [`RateLimitPolicy`].
#[derive(Clone, Debug)]
pub struct RateLimitContext {
	/// Caller identity.
	pub identity: Identity,
	/// Logical operation being accessed.
	pub route: RouteId,
	/// Instant the request was observed.
	pub observed_at: OffsetDateTime,
}
impl RateLimitContext {
	/// Creates a new context observed now.
	pub fn new(identity: Identity, route: RouteId) -> Self {
		Self { identity, route, observed_at: OffsetDateTime::now_utc() }
	}

	/// Overrides the timestamp associated with the observation.
	pub fn with_observed_at(mut self, instant: OffsetDateTime) -> Self {
		self.observed_at = instant;

		self
	}

	/// Composite key the request counts under.
	pub fn key(&self) -> RateLimitKey {
		RateLimitKey::new(&self.identity, &self.route)
	}
}

/// Quota metadata emitted with every decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaStatus {
	/// Request budget of the window.
	pub limit: u32,
	/// Requests left in the window, never negative.
	pub remaining: u32,
	/// Instant the window closes.
	pub reset_at: OffsetDateTime,
}
impl QuotaStatus {
	/// Reset instant in whole seconds since the Unix epoch, rounded up.
	pub fn reset_epoch_secs(&self) -> i64 {
		let secs = self.reset_at.unix_timestamp();

		if self.reset_at.nanosecond() > 0 { secs + 1 } else { secs }
	}
}

/// Rejected request details.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rejection {
	/// Quota metadata at rejection time.
	pub quota: QuotaStatus,
	/// Whole seconds until the window closes, rounded up and at least one.
	pub retry_after_secs: u64,
}
impl Rejection {
	/// Builds a rejection for a window that closes in `until_reset`.
	///
	/// The hint is `until_reset` in whole seconds rounded up, but never below one: a request
	/// rejected exactly at the reset instant would otherwise be told to retry immediately, into
	/// the same window.
	pub fn new(quota: QuotaStatus, until_reset: Duration) -> Self {
		let millis = u128::try_from(until_reset.whole_milliseconds()).unwrap_or(0);
		let secs = u64::try_from(millis.div_ceil(1_000)).unwrap_or(u64::MAX);

		Self { quota, retry_after_secs: secs.max(1) }
	}

	/// Retry hint as a duration.
	pub fn retry_after(&self) -> Duration {
		Duration::seconds(i64::try_from(self.retry_after_secs).unwrap_or(i64::MAX))
	}

	/// User-facing `429` body.
	pub fn error_body(&self) -> ErrorBody {
		ErrorBody::new(429, "Too many requests. Please try again later.")
			.with_retry_after(self.retry_after_secs)
	}
}

/// Outcome of a rate limit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed.
	Allow(QuotaStatus),
	/// The request exceeded the window budget.
	Reject(Rejection),
}
impl RateLimitDecision {
	/// Whether the request may proceed.
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow(_))
	}

	/// Quota metadata for the decision.
	pub fn quota(&self) -> &QuotaStatus {
		match self {
			Self::Allow(quota) => quota,
			Self::Reject(rejection) => &rejection.quota,
		}
	}

	/// Rejection details, if the request was rejected.
	pub fn rejection(&self) -> Option<&Rejection> {
		match self {
			Self::Allow(_) => None,
			Self::Reject(rejection) => Some(rejection),
		}
	}

	/// Response headers describing the decision.
	pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
		let quota = self.quota();
		let mut headers = vec![
			(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit)),
			(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining)),
			(X_RATELIMIT_RESET, HeaderValue::from(quota.reset_epoch_secs())),
		];

		if let Some(rejection) = self.rejection() {
			headers.push((RETRY_AFTER, HeaderValue::from(rejection.retry_after_secs)));
		}

		headers
	}

	/// Writes [`Self::headers`] into `target`, replacing earlier values.
	pub fn apply_headers(&self, target: &mut HeaderMap) {
		for (name, value) in self.headers() {
			target.insert(name, value);
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn quota() -> QuotaStatus {
		QuotaStatus { limit: 2, remaining: 0, reset_at: datetime!(2026-03-02 09:01:00.250 UTC) }
	}

	#[test]
	fn reset_rounds_up_to_whole_seconds() {
		let exact = QuotaStatus { reset_at: datetime!(2026-03-02 09:01 UTC), ..quota() };

		assert_eq!(quota().reset_epoch_secs(), exact.reset_epoch_secs() + 1);
	}

	#[test]
	fn allow_headers_omit_retry_after() {
		let mut headers = HeaderMap::new();

		RateLimitDecision::Allow(QuotaStatus { remaining: 1, ..quota() })
			.apply_headers(&mut headers);

		assert_eq!(headers[X_RATELIMIT_LIMIT], "2");
		assert_eq!(headers[X_RATELIMIT_REMAINING], "1");
		assert!(headers.get(RETRY_AFTER).is_none());
	}

	#[test]
	fn reject_headers_and_body_carry_retry_hint() {
		let rejection = Rejection::new(quota(), Duration::milliseconds(39_001));
		let decision = RateLimitDecision::Reject(rejection);
		let mut headers = HeaderMap::new();

		decision.apply_headers(&mut headers);

		assert_eq!(headers[RETRY_AFTER], "40");
		assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
		assert_eq!(rejection.retry_after(), Duration::seconds(40));
		assert_eq!(rejection.error_body().retry_after, Some(40));
		assert_eq!(rejection.error_body().status_code, 429);
	}

	#[test]
	fn retry_hint_is_never_zero() {
		assert_eq!(Rejection::new(quota(), Duration::ZERO).retry_after_secs, 1);
		assert_eq!(Rejection::new(quota(), Duration::seconds(-3)).retry_after_secs, 1);
	}
}
