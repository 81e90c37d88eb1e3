//! Observability for client exchanges.
//!
//! Every exchange the client performs (a caller's request, the refresh call, a retried
//! resubmission) runs under an [`Observation`]. The observation counts the attempt when it
//! begins and the final outcome when it finishes.
//!
//! # Feature Flags
//!
//! - `tracing`: the exchange runs inside a `bearer_client.exchange` span carrying `kind` and
//!   `stage` fields. Refresh failures and store-clear failures emit `warn` events.
//! - `metrics`: attempts and outcomes increment `bearer_client_exchange_total`, labeled by
//!   `kind` + `outcome`.
//!
//! With neither feature enabled an observation compiles down to nothing.

mod metrics;
mod tracing;

pub(crate) use tracing::warn;

// self
use crate::{_prelude::*, obs::tracing::ExchangeSpan};

/// Exchange kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
	/// Caller-initiated request through the pipeline, including any internal recovery.
	Request,
	/// Credential refresh call.
	Refresh,
	/// Single resubmission after a transient failure.
	Retry,
}
impl ExchangeKind {
	/// Label used for the `kind` span field and metric label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Request => "request",
			Self::Refresh => "refresh",
			Self::Retry => "retry",
		}
	}
}

/// Outcome labels counted per exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeOutcome {
	/// The exchange started.
	Attempt,
	/// The exchange settled successfully.
	Success,
	/// The exchange settled with an error.
	Failure,
}
impl ExchangeOutcome {
	/// Label used for the `outcome` metric label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}

	/// Final outcome of a settled exchange.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}
}

/// One exchange being observed, from its attempt to its final outcome.
#[derive(Debug)]
pub struct Observation {
	kind: ExchangeKind,
	span: ExchangeSpan,
}
impl Observation {
	/// Opens the span for `kind` at call site `stage` and counts the attempt.
	pub fn begin(kind: ExchangeKind, stage: &'static str) -> Self {
		metrics::count(kind, ExchangeOutcome::Attempt);

		Self { kind, span: ExchangeSpan::open(kind, stage) }
	}

	/// Kind of exchange being observed.
	pub fn kind(&self) -> ExchangeKind {
		self.kind
	}

	/// Counts the outcome of an exchange that was driven outside [`Observation::observe`].
	pub fn finish<T, E>(self, result: &Result<T, E>) {
		metrics::count(self.kind, ExchangeOutcome::of(result));
	}

	/// Drives `fut` inside the span, then counts its outcome.
	pub async fn observe<Fut, T, E>(self, fut: Fut) -> Result<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
	{
		let result = self.span.wrap(fut).await;

		self.finish(&result);

		result
	}
}
