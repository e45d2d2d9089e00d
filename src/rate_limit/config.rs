//! Window/quota configuration and the per-route override table.

// self
use crate::{_prelude::*, auth::RouteId, config::parse_env, error::ConfigError};

/// Variable holding the default window length in milliseconds.
pub const WINDOW_MS_ENV: &str = "RATE_LIMIT_WINDOW_MS";
/// Variable holding the default request budget per window.
pub const MAX_REQUESTS_ENV: &str = "RATE_LIMIT_MAX_REQUESTS";

/// Window length and request budget applied to one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
	/// Length of the fixed window.
	pub window: Duration,
	/// Requests admitted per window; the first request of a window is always admitted.
	pub max_requests: u32,
}
impl RateLimitConfig {
	/// Default window length.
	pub const DEFAULT_WINDOW: Duration = Duration::minutes(1);
	/// Default request budget.
	pub const DEFAULT_MAX_REQUESTS: u32 = 100;
	/// Longest accepted window.
	pub const MAX_WINDOW: Duration = Duration::days(366);

	/// Creates a configuration; the window must be positive and at most [`Self::MAX_WINDOW`].
	pub fn new(window: Duration, max_requests: u32) -> Result<Self, ConfigError> {
		if !window.is_positive() {
			return Err(ConfigError::NonPositiveWindow);
		}
		if window > Self::MAX_WINDOW {
			return Err(ConfigError::WindowTooLong { window, max: Self::MAX_WINDOW });
		}

		Ok(Self { window, max_requests })
	}

	/// Creates a configuration from a window expressed in milliseconds.
	pub fn from_millis(window_ms: u64, max_requests: u32) -> Result<Self, ConfigError> {
		let window = Duration::milliseconds(i64::try_from(window_ms).unwrap_or(i64::MAX));

		Self::new(window, max_requests)
	}

	/// Loads the default configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads the default configuration through `lookup`; unset variables keep their defaults.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = Self::default();
		let window = match parse_env::<u64, _>(&lookup, WINDOW_MS_ENV)? {
			Some(ms) => Self::from_millis(ms, defaults.max_requests)?.window,
			None => defaults.window,
		};
		let max_requests =
			parse_env::<u32, _>(&lookup, MAX_REQUESTS_ENV)?.unwrap_or(defaults.max_requests);

		Self::new(window, max_requests)
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self { window: Self::DEFAULT_WINDOW, max_requests: Self::DEFAULT_MAX_REQUESTS }
	}
}

/// Per-route overrides consulted before the default configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteLimits(HashMap<RouteId, RateLimitConfig>);
impl RouteLimits {
	/// Adds or replaces the override for `route`.
	pub fn with_route(mut self, route: RouteId, config: RateLimitConfig) -> Self {
		self.0.insert(route, config);

		self
	}

	/// Override for `route`, if any.
	pub fn get(&self, route: &RouteId) -> Option<&RateLimitConfig> {
		self.0.get(route)
	}

	/// Number of overridden routes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether no route is overridden.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl FromIterator<(RouteId, RateLimitConfig)> for RouteLimits {
	fn from_iter<I: IntoIterator<Item = (RouteId, RateLimitConfig)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn windows_must_be_positive() {
		assert!(matches!(RateLimitConfig::from_millis(0, 5), Err(ConfigError::NonPositiveWindow)));
		assert!(matches!(
			RateLimitConfig::new(Duration::seconds(-1), 5),
			Err(ConfigError::NonPositiveWindow)
		));

		let config = RateLimitConfig::from_millis(1_500, 0).expect("Zero budgets are allowed.");

		assert_eq!(config.window, Duration::milliseconds(1_500));
	}

	#[test]
	fn oversized_windows_are_rejected() {
		let vars = HashMap::from([(WINDOW_MS_ENV, u64::MAX.to_string())]);

		assert!(matches!(
			RateLimitConfig::from_lookup(|key| vars.get(key).cloned()),
			Err(ConfigError::WindowTooLong { .. })
		));
		assert!(matches!(
			RateLimitConfig::new(RateLimitConfig::MAX_WINDOW + Duration::SECOND, 1),
			Err(ConfigError::WindowTooLong { .. })
		));
		assert!(RateLimitConfig::new(RateLimitConfig::MAX_WINDOW, 1).is_ok());
	}

	#[test]
	fn lookup_overrides_defaults() {
		let vars = HashMap::from([(WINDOW_MS_ENV, "30000"), (MAX_REQUESTS_ENV, "5")]);
		let config = RateLimitConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
			.expect("Lookup fixture should produce a configuration.");

		assert_eq!(config, RateLimitConfig { window: Duration::seconds(30), max_requests: 5 });
		assert_eq!(
			RateLimitConfig::from_lookup(|_| None).expect("Defaults should apply."),
			RateLimitConfig::default()
		);

		let bad = HashMap::from([(MAX_REQUESTS_ENV, "-3")]);

		assert!(matches!(
			RateLimitConfig::from_lookup(|key| bad.get(key).map(|v| v.to_string())),
			Err(ConfigError::InvalidEnv { key: MAX_REQUESTS_ENV, .. })
		));
	}

	#[test]
	fn route_table_collects_overrides() {
		let login = RouteId::new("POST:/auth/login").expect("Route fixture should be valid.");
		let strict = RateLimitConfig::from_millis(60_000, 5).expect("Override fixture is valid.");
		let limits: RouteLimits = [(login.clone(), strict)].into_iter().collect();

		assert_eq!(limits.get(&login).map(|c| c.max_requests), Some(5));
		assert_eq!(limits.len(), 1);
		assert!(RouteLimits::default().is_empty());
	}
}
