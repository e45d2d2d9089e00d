//! Optional observability helpers for proxy and limiter flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `zharqyn_edge.flow` with the `flow` and
//!   `stage` fields, plus events for refresh outcomes, rejections, and sweeps.
//! - Enable `metrics` to increment the `zharqyn_edge_flow_total` counter for every recorded
//!   outcome, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// One logical forwarded operation (initial attempt plus optional refresh and retry).
	Forward,
	/// Silent credential refresh.
	Refresh,
	/// Rate limit evaluation.
	RateLimit,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Forward => "forward",
			FlowKind::Refresh => "refresh",
			FlowKind::RateLimit => "rate_limit",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Request admitted by the limiter.
	Allowed,
	/// Request rejected by the limiter.
	Rejected,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Allowed => "allowed",
			FlowOutcome::Rejected => "rejected",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
