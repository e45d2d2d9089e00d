// self
use crate::{_prelude::*, error::RefreshError, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by proxy and limiter flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("zharqyn_edge.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			FlowSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			FlowSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`FlowSpan::entered`].
pub struct FlowSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}

/// Emits an event for a refresh that minted a new access token.
pub(crate) fn refresh_succeeded(fingerprint: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(access_fingerprint = fingerprint, "Upstream access token refreshed.");
	#[cfg(not(feature = "tracing"))]
	let _ = fingerprint;
}

/// Emits an event for a refresh that produced no token; the original `401` is returned.
pub(crate) fn refresh_declined(err: &RefreshError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(error = %err, "Silent refresh failed; returning the original 401.");
	#[cfg(not(feature = "tracing"))]
	let _ = err;
}

/// Emits an event for a `401` that could not be recovered because no refresh token was sent.
pub(crate) fn refresh_unavailable() {
	#[cfg(feature = "tracing")]
	tracing::debug!("Upstream returned 401 and no refresh token is available.");
}

/// Emits an event for a rejected request.
pub(crate) fn request_throttled(key: &str, retry_after_secs: u64) {
	#[cfg(feature = "tracing")]
	tracing::info!(key, retry_after_secs, "Rate limit exceeded.");
	#[cfg(not(feature = "tracing"))]
	let _ = (key, retry_after_secs);
}

/// Emits an event summarizing an expiry sweep.
pub(crate) fn windows_swept(removed: usize, remaining: usize) {
	#[cfg(feature = "tracing")]
	tracing::debug!(removed, remaining, "Expired rate limit windows swept.");
	#[cfg(not(feature = "tracing"))]
	let _ = (removed, remaining);
}
