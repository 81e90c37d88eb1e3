//! Counter plumbing behind the `metrics` feature.

// self
use crate::obs::{ExchangeKind, ExchangeOutcome};

const EXCHANGE_TOTAL: &str = "bearer_client_exchange_total";

/// Bumps the exchange counter on the global recorder.
pub(crate) fn count(kind: ExchangeKind, outcome: ExchangeOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(EXCHANGE_TOTAL, "kind" => kind.as_str(), "outcome" => outcome.as_str())
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (EXCHANGE_TOTAL, kind, outcome);
	}
}
