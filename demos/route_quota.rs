//! Demonstrates per-route quotas: a strict budget on the login route, the default budget
//! elsewhere, and the headers a server would attach to each answer.

// std
use std::{net::IpAddr, sync::Arc};
// crates.io
use color_eyre::Result;
// self
use zharqyn_edge::{
	auth::RouteId,
	http_types::{HeaderMap, Method},
	rate_limit::{FixedWindowLimiter, Identity, RateLimitConfig, RouteLimits},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let login = RouteId::from_method_path(Method::POST.as_str(), "/auth/login")?;
	let reports = RouteId::from_method_path(Method::GET.as_str(), "/reports")?;
	let limiter = Arc::new(FixedWindowLimiter::new(
		RateLimitConfig::from_env()?,
		RouteLimits::default().with_route(login.clone(), RateLimitConfig::from_millis(900_000, 5)?),
	));
	let _sweeper = limiter.spawn_sweeper(std::time::Duration::from_secs(60));
	let caller = Identity::from_forwarded(None, Some("203.0.113.7, 10.0.0.1"), None::<IpAddr>);

	for attempt in 1..=6 {
		let decision = limiter.check(&caller, &login);
		let mut headers = HeaderMap::new();

		decision.apply_headers(&mut headers);

		match decision.rejection() {
			None => println!("Login attempt {attempt}: allowed, {headers:?}."),
			Some(rejection) => println!(
				"Login attempt {attempt}: rejected, body {}.",
				String::from_utf8_lossy(&rejection.error_body().to_json())
			),
		}
	}

	let decision = limiter.check(&caller, &reports);

	println!("Reports: {} of {} left.", decision.quota().remaining, decision.quota().limit);

	Ok(())
}
