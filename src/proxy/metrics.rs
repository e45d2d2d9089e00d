// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for forward and refresh activity.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
	forwards: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_success: AtomicU64,
	refresh_failure: AtomicU64,
	retries: AtomicU64,
}
impl ProxyMetrics {
	/// Returns the number of forwards that reached the upstream (authenticated callers only).
	pub fn forwards(&self) -> u64 {
		self.forwards.load(Ordering::Relaxed)
	}

	/// Returns the total number of refresh calls.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that minted a token.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_success.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls that produced no token.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failure.load(Ordering::Relaxed)
	}

	/// Returns the number of requests reissued with a refreshed token.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	pub(crate) fn record_forward(&self) {
		self.forwards.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}
}
