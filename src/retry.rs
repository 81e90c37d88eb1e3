//! Single bounded retry for transient failures.
//!
//! The policy grants at most one retry per descriptor. `max_retries` is carried for
//! configuration compatibility but never raises that bound.

// self
use crate::{
	_prelude::*, config::ClientConfig, normalize::NormalizedError, request::RequestDescriptor,
};

/// Retry gate derived from [`ClientConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Whether transient failures may be retried at all.
	pub enabled: bool,
	/// Delay awaited before the retry.
	pub delay: Duration,
	/// Configured attempt count; informational only.
	pub max_retries: u32,
}
impl RetryPolicy {
	/// A policy that never retries.
	pub const DISABLED: Self = Self { enabled: false, delay: Duration::ZERO, max_retries: 0 };

	/// Builds the policy from the client configuration.
	pub fn from_config(config: &ClientConfig) -> Self {
		Self { enabled: config.retry, delay: config.retry_delay(), max_retries: config.max_retries }
	}

	/// Returns the delay before resubmitting, or `None` when the failure must be surfaced.
	///
	/// A retry is granted only when retries are enabled, the descriptor has not been resubmitted
	/// yet, and the failure is `Network` or `Server`.
	pub fn should_retry(
		&self,
		error: &NormalizedError,
		descriptor: &RequestDescriptor,
	) -> Option<Duration> {
		if !self.enabled || descriptor.retried() || !error.is_retryable() {
			return None;
		}

		Some(self.delay)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::DISABLED
	}
}
