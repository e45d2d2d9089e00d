// std
use std::{net::IpAddr, sync::Arc};
// crates.io
use time::{Duration, OffsetDateTime};
// self
use zharqyn_edge::{
	auth::{RouteId, UserId},
	http_types::{HeaderMap, header::RETRY_AFTER},
	rate_limit::{
		FixedWindowLimiter, Identity, RateLimitConfig, RateLimitContext, RateLimitPolicy,
		RouteLimits, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
	},
};

fn route(raw: &str) -> RouteId {
	RouteId::new(raw).expect("Route fixture should be valid.")
}

fn address(raw: &str) -> Identity {
	Identity::resolve(None, Some(raw.parse::<IpAddr>().expect("Address fixture should parse.")))
}

#[test]
fn login_route_override_is_stricter_than_default() {
	let login = route("POST:/auth/login");
	let children = route("GET:/children");
	let limiter = FixedWindowLimiter::new(
		RateLimitConfig::from_millis(60_000, 100).expect("Default fixture should be valid."),
		RouteLimits::default().with_route(
			login.clone(),
			RateLimitConfig::from_millis(900_000, 5).expect("Login fixture should be valid."),
		),
	);
	let caller = address("198.51.100.20");
	let now = OffsetDateTime::now_utc();
	let login_decisions: Vec<_> =
		(0..6).map(|_| limiter.check_at(&caller, &login, now)).collect();

	assert!(login_decisions[..5].iter().all(|decision| decision.is_allowed()));

	let rejection = login_decisions[5].rejection().expect("Sixth login attempt must be rejected.");

	assert_eq!(rejection.quota.limit, 5);
	assert_eq!(rejection.retry_after_secs, 900);

	let other = limiter.check_at(&caller, &children, now);

	assert!(other.is_allowed());
	assert_eq!(other.quota().limit, 100);
	assert_eq!(other.quota().remaining, 99);
}

#[test]
fn decision_headers_follow_the_window() {
	let limiter = FixedWindowLimiter::with_defaults(
		RateLimitConfig::from_millis(60_000, 2).expect("Fixture should be valid."),
	);
	let caller = Identity::resolve(
		Some(UserId::new("parent-42").expect("User fixture should be valid.")),
		None,
	);
	let submit = route("POST:/tests/submit");
	let start = OffsetDateTime::from_unix_timestamp(1_767_225_600)
		.expect("Fixture timestamp should be valid.");

	limiter.check_at(&caller, &submit, start);
	limiter.check_at(&caller, &submit, start + Duration::seconds(10));

	let rejected = limiter.check_at(&caller, &submit, start + Duration::seconds(20));
	let mut headers = HeaderMap::new();

	rejected.apply_headers(&mut headers);

	assert_eq!(headers[X_RATELIMIT_LIMIT], "2");
	assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
	assert_eq!(headers[X_RATELIMIT_RESET], "1767225660");
	assert_eq!(headers[RETRY_AFTER], "40");

	let body = rejected.rejection().expect("Third request must be rejected.").error_body();

	assert_eq!(body.status_code, 429);
	assert_eq!(body.retry_after, Some(40));
}

#[test]
fn users_and_addresses_never_share_buckets() {
	let limiter = FixedWindowLimiter::with_defaults(
		RateLimitConfig::from_millis(60_000, 1).expect("Fixture should be valid."),
	);
	let target = route("GET:/children");
	let now = OffsetDateTime::now_utc();
	let user = Identity::resolve(Some(UserId::new("1").expect("User fixture is valid.")), None);

	assert!(limiter.check_at(&user, &target, now).is_allowed());
	assert!(limiter.check_at(&address("10.0.0.1"), &target, now).is_allowed());
	assert!(limiter.check_at(&address("10.0.0.2"), &target, now).is_allowed());
	assert!(!limiter.check_at(&user, &target, now).is_allowed());
	assert_eq!(limiter.len(), 3);
}

#[tokio::test]
async fn policy_trait_object_counts_requests() {
	let limiter: Arc<dyn RateLimitPolicy> = Arc::new(FixedWindowLimiter::with_defaults(
		RateLimitConfig::from_millis(1_000, 1).expect("Fixture should be valid."),
	));
	let context = RateLimitContext::new(address("203.0.113.5"), route("GET:/reports"));
	let first = limiter.evaluate(&context).await.expect("In-process policy never fails.");
	let second = limiter.evaluate(&context).await.expect("In-process policy never fails.");

	assert!(first.is_allowed());
	assert!(second.rejection().is_some_and(|rejection| rejection.retry_after_secs >= 1));
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn background_sweeper_evicts_closed_windows() {
	let limiter = Arc::new(FixedWindowLimiter::with_defaults(
		RateLimitConfig::from_millis(60_000, 10).expect("Fixture should be valid."),
	));
	let stale_at = OffsetDateTime::now_utc() - Duration::minutes(5);

	limiter.check_at(&address("192.0.2.1"), &route("GET:/a"), stale_at);
	limiter.check_at(&address("192.0.2.2"), &route("GET:/b"), stale_at);
	limiter.check(&address("192.0.2.3"), &route("GET:/c"));

	assert_eq!(limiter.len(), 3);

	let sweeper = limiter.spawn_sweeper(std::time::Duration::from_millis(10));

	for _ in 0..100 {
		if limiter.len() == 1 {
			break;
		}

		tokio::time::sleep(std::time::Duration::from_millis(10)).await;
	}

	assert_eq!(limiter.len(), 1);

	drop(limiter);

	tokio::time::timeout(std::time::Duration::from_secs(1), sweeper)
		.await
		.expect("Sweeper should stop once the limiter is dropped.")
		.expect("Sweeper task should not panic.");
}
