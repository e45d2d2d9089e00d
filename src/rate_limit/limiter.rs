//! In-process fixed-window limiter.
//!
//! One mutex guards the whole window map, so a check and a sweep never interleave on the same
//! key and concurrent increments are never lost. Deployments running several processes must
//! implement [`RateLimitPolicy`] over a shared atomic-increment store instead.

// self
use crate::{
	_prelude::*,
	auth::RouteId,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	rate_limit::{
		Identity, QuotaStatus, RateLimitConfig, RateLimitContext, RateLimitDecision,
		RateLimitFuture, RateLimitKey, RateLimitPolicy, Rejection, RouteLimits,
	},
};

/// Counter state for one key inside its current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowEntry {
	/// Requests seen in the window, including rejected ones.
	pub count: u32,
	/// Instant the window closes.
	pub reset_at: OffsetDateTime,
}
impl WindowEntry {
	// Public config fields bypass validation, so an unrepresentable reset clamps to the longest
	// accepted window.
	fn open(now: OffsetDateTime, window: Duration) -> Self {
		let reset_at = now
			.checked_add(window)
			.or_else(|| now.checked_add(RateLimitConfig::MAX_WINDOW))
			.unwrap_or(now);

		Self { count: 1, reset_at }
	}

	/// Whether the window closed before `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now > self.reset_at
	}
}

/// Fixed-window limiter keyed by identity and route.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
	defaults: RateLimitConfig,
	routes: RouteLimits,
	windows: Mutex<HashMap<RateLimitKey, WindowEntry>>,
}
impl FixedWindowLimiter {
	/// Creates a limiter with `defaults` and per-route overrides.
	pub fn new(defaults: RateLimitConfig, routes: RouteLimits) -> Self {
		Self { defaults, routes, windows: Default::default() }
	}

	/// Creates a limiter without route overrides.
	pub fn with_defaults(defaults: RateLimitConfig) -> Self {
		Self::new(defaults, RouteLimits::default())
	}

	/// Effective configuration for `route`.
	pub fn config_for(&self, route: &RouteId) -> RateLimitConfig {
		self.routes.get(route).copied().unwrap_or(self.defaults)
	}

	/// Counts a request from `identity` against `route` at the current instant.
	pub fn check(&self, identity: &Identity, route: &RouteId) -> RateLimitDecision {
		self.check_at(identity, route, OffsetDateTime::now_utc())
	}

	/// Counts a request from `identity` against `route` at `now`.
	pub fn check_at(
		&self,
		identity: &Identity,
		route: &RouteId,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		self.check_key_at(&RateLimitKey::new(identity, route), self.config_for(route), now)
	}

	/// Counts a request under `key` with an explicit configuration at `now`.
	///
	/// An absent or expired entry opens a new window and the request is admitted regardless of
	/// the budget. Inside a window the count grows on every call, rejected calls included.
	pub fn check_key_at(
		&self,
		key: &RateLimitKey,
		config: RateLimitConfig,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		let (entry, opened) = {
			let mut windows = self.windows.lock();

			match windows.get_mut(key) {
				Some(entry) if !entry.is_expired_at(now) => {
					entry.count = entry.count.saturating_add(1);

					(*entry, false)
				},
				_ => {
					let entry = WindowEntry::open(now, config.window);

					windows.insert(key.clone(), entry);

					(entry, true)
				},
			}
		};
		let quota = QuotaStatus {
			limit: config.max_requests,
			remaining: config.max_requests.saturating_sub(entry.count),
			reset_at: entry.reset_at,
		};

		if !opened && entry.count > config.max_requests {
			let rejection = Rejection::new(quota, entry.reset_at - now);

			obs::request_throttled(key.as_ref(), rejection.retry_after_secs);
			obs::record_retry_after(rejection.retry_after_secs);
			obs::record_flow_outcome(FlowKind::RateLimit, FlowOutcome::Rejected);

			RateLimitDecision::Reject(rejection)
		} else {
			obs::record_flow_outcome(FlowKind::RateLimit, FlowOutcome::Allowed);

			RateLimitDecision::Allow(quota)
		}
	}

	/// Current entry for `key`, if one exists.
	pub fn entry(&self, key: &RateLimitKey) -> Option<WindowEntry> {
		self.windows.lock().get(key).copied()
	}

	/// Number of tracked keys.
	pub fn len(&self) -> usize {
		self.windows.lock().len()
	}

	/// Whether no key is tracked.
	pub fn is_empty(&self) -> bool {
		self.windows.lock().is_empty()
	}

	/// Removes entries whose window has closed; returns how many were removed.
	pub fn sweep_expired(&self) -> usize {
		self.sweep_expired_at(OffsetDateTime::now_utc())
	}

	/// Removes entries whose window closed before `now`.
	pub fn sweep_expired_at(&self, now: OffsetDateTime) -> usize {
		let _span = FlowSpan::new(FlowKind::RateLimit, "sweep").entered();
		let mut windows = self.windows.lock();
		let before = windows.len();

		windows.retain(|_, entry| !entry.is_expired_at(now));

		let removed = before - windows.len();

		if removed > 0 {
			obs::windows_swept(removed, windows.len());
		}

		obs::record_tracked_windows(windows.len());

		removed
	}

	/// Runs [`Self::sweep_expired`] every `every` on the current Tokio runtime.
	///
	/// The task holds a weak reference and exits once the limiter is dropped.
	#[cfg(feature = "tokio")]
	pub fn spawn_sweeper(
		self: &Arc<Self>,
		every: std::time::Duration,
	) -> tokio::task::JoinHandle<()> {
		let limiter = Arc::downgrade(self);
		let every = every.max(std::time::Duration::from_millis(1));

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(every);

			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				let Some(limiter) = limiter.upgrade() else {
					break;
				};

				limiter.sweep_expired();
			}
		})
	}
}
impl RateLimitPolicy for FixedWindowLimiter {
	fn evaluate(&self, context: &RateLimitContext) -> RateLimitFuture<'_> {
		let decision = self.check_at(&context.identity, &context.route, context.observed_at);

		Box::pin(async move { Ok(decision) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const T0: OffsetDateTime = datetime!(2026-03-02 09:00 UTC);

	fn key(raw: &str) -> RateLimitKey {
		RateLimitKey::from_raw(raw)
	}

	fn config(window_secs: i64, max_requests: u32) -> RateLimitConfig {
		RateLimitConfig::new(Duration::seconds(window_secs), max_requests)
			.expect("Limiter fixture configuration should be valid.")
	}

	#[test]
	fn budget_of_three_counts_down_then_rejects() {
		let limiter = FixedWindowLimiter::default();
		let cfg = config(60, 3);
		let remaining: Vec<_> = (0..3)
			.map(|i| limiter.check_key_at(&key("k"), cfg, T0 + Duration::seconds(i)))
			.map(|decision| {
				assert!(decision.is_allowed());

				decision.quota().remaining
			})
			.collect();

		assert_eq!(remaining, vec![2, 1, 0]);

		let fourth = limiter.check_key_at(&key("k"), cfg, T0 + Duration::seconds(3));
		let rejection = fourth.rejection().expect("Fourth request must be rejected.");

		assert!(rejection.retry_after_secs > 0);
		assert_eq!(rejection.quota.remaining, 0);
	}

	#[test]
	fn window_boundary_scenario() {
		let limiter = FixedWindowLimiter::default();
		let cfg = config(60, 2);
		let at = |secs| limiter.check_key_at(&key("scenario"), cfg, T0 + Duration::seconds(secs));

		assert_eq!(at(0).quota().remaining, 1);

		let second = at(10);

		assert!(second.is_allowed());
		assert_eq!(second.quota().remaining, 0);
		assert_eq!(at(20).rejection().map(|r| r.retry_after_secs), Some(40));

		let fresh = at(70);

		assert!(fresh.is_allowed());
		assert_eq!(fresh.quota().remaining, 1);
		assert_eq!(fresh.quota().reset_at, T0 + Duration::seconds(130));
		assert_eq!(limiter.entry(&key("scenario")).map(|e| e.count), Some(1));
	}

	#[test]
	fn window_closes_strictly_after_reset() {
		let limiter = FixedWindowLimiter::default();
		let cfg = config(60, 1);

		limiter.check_key_at(&key("edge"), cfg, T0);

		let at_reset = limiter.check_key_at(&key("edge"), cfg, T0 + Duration::seconds(60));

		assert_eq!(at_reset.rejection().map(|r| r.retry_after_secs), Some(1));
		let after_reset = T0 + Duration::milliseconds(60_001);

		assert!(limiter.check_key_at(&key("edge"), cfg, after_reset).is_allowed());
	}

	#[test]
	fn first_request_is_admitted_even_with_zero_budget() {
		let limiter = FixedWindowLimiter::default();
		let cfg = config(60, 0);
		let first = limiter.check_key_at(&key("zero"), cfg, T0);

		assert!(first.is_allowed());
		assert_eq!(first.quota().remaining, 0);
		assert!(!limiter.check_key_at(&key("zero"), cfg, T0).is_allowed());
	}

	#[test]
	fn unvalidated_huge_window_does_not_overflow() {
		let limiter = FixedWindowLimiter::default();
		let cfg = RateLimitConfig { window: Duration::MAX, max_requests: 1 };
		let first = limiter.check_key_at(&key("huge"), cfg, T0);

		assert!(first.is_allowed());
		assert_eq!(first.quota().reset_at, T0 + RateLimitConfig::MAX_WINDOW);
		assert!(!limiter.check_key_at(&key("huge"), cfg, T0).is_allowed());
	}

	#[test]
	fn keys_do_not_interfere() {
		let limiter = FixedWindowLimiter::default();
		let cfg = config(60, 1);

		limiter.check_key_at(&key("a"), cfg, T0);

		assert!(!limiter.check_key_at(&key("a"), cfg, T0).is_allowed());
		assert!(limiter.check_key_at(&key("b"), cfg, T0).is_allowed());
		assert_eq!(limiter.entry(&key("b")).map(|e| e.count), Some(1));
	}

	#[test]
	fn retry_after_rounds_up_to_whole_seconds() {
		let limiter = FixedWindowLimiter::default();
		let cfg = config(10, 1);

		limiter.check_key_at(&key("ceil"), cfg, T0);

		let rejected = limiter.check_key_at(&key("ceil"), cfg, T0 + Duration::milliseconds(8_500));

		assert_eq!(rejected.rejection().map(|r| r.retry_after_secs), Some(2));
	}

	#[test]
	fn sweep_removes_only_closed_windows() {
		let limiter = FixedWindowLimiter::default();

		limiter.check_key_at(&key("old"), config(10, 5), T0);
		limiter.check_key_at(&key("live"), config(600, 5), T0);

		assert_eq!(limiter.sweep_expired_at(T0 + Duration::seconds(5)), 0);
		assert_eq!(limiter.len(), 2);
		assert_eq!(limiter.sweep_expired_at(T0 + Duration::seconds(11)), 1);
		assert!(limiter.entry(&key("old")).is_none());
		assert!(limiter.entry(&key("live")).is_some());
		assert_eq!(limiter.sweep_expired_at(T0 + Duration::seconds(11)), 0);
	}

	#[test]
	fn route_overrides_take_precedence() {
		let login = RouteId::new("POST:/auth/login").expect("Route fixture should be valid.");
		let list = RouteId::new("GET:/tests").expect("Route fixture should be valid.");
		let limiter = FixedWindowLimiter::new(
			config(60, 100),
			RouteLimits::default().with_route(login.clone(), config(60, 1)),
		);
		let identity = Identity::Unknown;

		assert_eq!(limiter.config_for(&list).max_requests, 100);
		assert!(limiter.check_at(&identity, &login, T0).is_allowed());
		assert!(!limiter.check_at(&identity, &login, T0).is_allowed());
		assert_eq!(limiter.check_at(&identity, &list, T0).quota().limit, 100);
	}

	#[test]
	fn concurrent_checks_never_lose_increments() {
		let limiter = Arc::new(FixedWindowLimiter::default());
		let cfg = config(600, 1_000);
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let limiter = Arc::clone(&limiter);

				std::thread::spawn(move || {
					for _ in 0..50 {
						limiter.check_key_at(&key("shared"), cfg, T0);
					}
				})
			})
			.collect();

		for handle in handles {
			handle.join().expect("Limiter worker thread should not panic.");
		}

		assert_eq!(limiter.entry(&key("shared")).map(|e| e.count), Some(400));
	}

	#[tokio::test]
	async fn policy_evaluates_context() {
		let limiter = FixedWindowLimiter::with_defaults(config(60, 1));
		let route = RouteId::new("GET:/children").expect("Route fixture should be valid.");
		let context = RateLimitContext::new(Identity::Unknown, route).with_observed_at(T0);

		assert!(limiter.evaluate(&context).await.expect("Policy should evaluate.").is_allowed());
		assert!(!limiter.evaluate(&context).await.expect("Policy should evaluate.").is_allowed());
	}
}
