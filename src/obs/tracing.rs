//! Span and event plumbing behind the `tracing` feature.

// self
use crate::{_prelude::*, obs::ExchangeKind};

#[cfg(feature = "tracing")]
pub(crate) type Wrapped<F> = tracing::instrument::Instrumented<F>;
#[cfg(not(feature = "tracing"))]
pub(crate) type Wrapped<F> = F;

/// `bearer_client.exchange` span; zero-sized when tracing is off.
#[derive(Clone, Debug)]
pub(crate) struct ExchangeSpan(#[cfg(feature = "tracing")] tracing::Span);
impl ExchangeSpan {
	pub(crate) fn open(kind: ExchangeKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self(tracing::info_span!("bearer_client.exchange", kind = kind.as_str(), stage))
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self()
		}
	}

	/// Attaches the span to `fut`; no guard is held across `.await` points.
	pub(crate) fn wrap<Fut>(&self, fut: Fut) -> Wrapped<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.0.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `warn` event for a degraded exchange.
pub(crate) fn warn(stage: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(stage, error = %error, "exchange degraded");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, error);
	}
}
