//! Counters, histograms, and gauges emitted through the `metrics` facade.
//!
//! Every function compiles to a no-op without the `metrics` feature.

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per recorded flow outcome.
pub const FLOW_TOTAL: &str = "zharqyn_edge_flow_total";
/// Histogram of `Retry-After` hints handed to throttled callers, in seconds.
pub const RETRY_AFTER_SECONDS: &str = "zharqyn_edge_retry_after_seconds";
/// Gauge of keys held by the in-process limiter after a sweep.
pub const TRACKED_WINDOWS: &str = "zharqyn_edge_tracked_windows";

/// Records a flow outcome, labeled by `flow` and `outcome`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records the retry hint attached to a rejection.
pub fn record_retry_after(secs: u64) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(RETRY_AFTER_SECONDS).record(secs as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = secs;
}

/// Publishes how many windows the limiter still tracks.
pub fn record_tracked_windows(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::gauge!(TRACKED_WINDOWS).set(count as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = count;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_accept_values_without_a_global_recorder() {
		record_flow_outcome(FlowKind::RateLimit, FlowOutcome::Rejected);
		record_retry_after(40);
		record_tracked_windows(0);
	}
}
